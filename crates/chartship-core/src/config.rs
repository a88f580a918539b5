//! Pipeline settings and the environment they are read from

use std::fmt;
use std::str::FromStr;

use crate::error::{PluginError, Result};

/// Prefix CI runners put in front of every plugin setting
pub const ENV_PREFIX: &str = "PLUGIN_";

/// A pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Package the chart into a versioned archive
    Create,
    /// Copy the archive to the storage bucket
    Publish,
    /// Upgrade (or install) the release from the archive
    Deploy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Publish => "publish",
            Action::Deploy => "deploy",
        }
    }

    /// Whether the stage consumes the archive produced by `create`
    pub fn needs_archive(&self) -> bool {
        matches!(self, Action::Publish | Action::Deploy)
    }
}

impl FromStr for Action {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Action::Create),
            // `push` is the historical name of the stage
            "publish" | "push" => Ok(Action::Publish),
            "deploy" => Ok(Action::Deploy),
            other => Err(PluginError::UnknownAction {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value source for settings.
///
/// Every key is looked up as `PLUGIN_<KEY>` first and as the bare `<KEY>`
/// second. Empty values count as unset.
pub struct Settings<F> {
    lookup: F,
}

impl Settings<fn(&str) -> Option<String>> {
    /// Settings backed by the process environment
    pub fn from_env() -> Self {
        fn env_var(key: &str) -> Option<String> {
            std::env::var(key).ok()
        }
        Self { lookup: env_var }
    }
}

impl<F> Settings<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Settings backed by an arbitrary lookup function
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    /// Raw value of a setting
    pub fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(&format!("{}{}", ENV_PREFIX, key))
            .filter(|v| !v.is_empty())
            .or_else(|| (self.lookup)(key).filter(|v| !v.is_empty()))
    }

    /// Value of a setting, empty when unset
    pub fn string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }

    /// Value of a setting that must be present
    pub fn required(&self, key: &str) -> Result<String> {
        self.get(key).ok_or_else(|| PluginError::MissingSetting {
            key: key.to_string(),
        })
    }

    /// Comma-separated list; elements are trimmed and empty ones dropped
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Boolean setting, false when unset
    pub fn flag(&self, key: &str) -> Result<bool> {
        match self.get(key).as_deref() {
            None => Ok(false),
            Some("1" | "t" | "T" | "TRUE" | "true" | "True") => Ok(true),
            Some("0" | "f" | "F" | "FALSE" | "false" | "False") => Ok(false),
            Some(other) => Err(PluginError::InvalidSetting {
                key: key.to_string(),
                message: format!("expected a boolean, got '{}'", other),
            }),
        }
    }
}

/// Settings for a single run.
///
/// Populated once by [`PluginConfig::load`]; only default resolution changes
/// it afterwards.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PluginConfig {
    /// Trace every command and let it write to our stdout/stderr
    pub debug: bool,
    /// Print the names of all environment variables before running
    pub show_env: bool,
    /// Stages to run, in order
    pub actions: Vec<Action>,
    /// Service-account key (JSON)
    pub auth_key: String,
    pub zone: String,
    pub cluster: String,
    pub project: String,
    pub namespace: String,
    pub chart_repo: String,
    pub bucket: String,
    pub chart_path: String,
    pub chart_version: String,
    pub package: String,
    pub release: String,
    /// `key=value` overrides passed to `helm upgrade --set`
    pub values: Vec<String>,
}

impl PluginConfig {
    /// Load the configuration from settings.
    ///
    /// `ACTIONS` and `CHART_PATH` are required. Every action identifier is
    /// checked here, so an unknown stage fails before any command runs.
    pub fn load<F>(settings: &Settings<F>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let actions = settings.list("ACTIONS");
        if actions.is_empty() {
            return Err(PluginError::MissingSetting {
                key: "ACTIONS".to_string(),
            });
        }
        let actions = actions
            .iter()
            .map(|a| a.parse())
            .collect::<Result<Vec<Action>>>()?;

        Ok(Self {
            debug: settings.flag("DEBUG")?,
            show_env: settings.flag("SHOW_ENV")?,
            actions,
            auth_key: settings.string("AUTH_KEY"),
            zone: settings.string("ZONE"),
            cluster: settings.string("CLUSTER"),
            project: settings.string("PROJECT"),
            namespace: settings.string("NAMESPACE"),
            chart_repo: settings.string("CHART_REPO"),
            bucket: settings.string("BUCKET"),
            chart_path: settings.required("CHART_PATH")?,
            chart_version: settings.string("CHART_VERSION"),
            package: settings.string("PACKAGE"),
            release: settings.string("RELEASE"),
            values: settings.list("VALUES"),
        })
    }
}

// The key must never end up in logs
impl fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth_key = if self.auth_key.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("PluginConfig")
            .field("debug", &self.debug)
            .field("show_env", &self.show_env)
            .field("actions", &self.actions)
            .field("auth_key", &auth_key)
            .field("zone", &self.zone)
            .field("cluster", &self.cluster)
            .field("project", &self.project)
            .field("namespace", &self.namespace)
            .field("chart_repo", &self.chart_repo)
            .field("bucket", &self.bucket)
            .field("chart_path", &self.chart_path)
            .field("chart_version", &self.chart_version)
            .field("package", &self.package)
            .field("release", &self.release)
            .field("values", &self.values)
            .finish()
    }
}

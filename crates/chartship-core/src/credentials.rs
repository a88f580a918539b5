//! Service-account credentials for a single run
//!
//! The key is written to a private temporary file, `gcloud` is pointed at it,
//! and the cluster connection is fetched into the local kube config. The file
//! path is handed to later commands through [`Credentials::env`] rather than
//! through the process environment.

use std::io::Write;
use std::path::Path;

use tempfile::TempPath;

use crate::config::{Action, PluginConfig};
use crate::error::{PluginError, Result};
use crate::runner::{CommandRunner, CommandSpec};
use crate::toolchain::Toolchain;

/// Variable Google client libraries read the key file location from
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// An activated service-account key.
///
/// The key file is removed when this value is dropped.
#[derive(Debug)]
pub struct Credentials {
    key_file: TempPath,
}

impl Credentials {
    /// Location of the key file
    pub fn key_file(&self) -> &Path {
        &self.key_file
    }

    /// Environment override pointing client libraries at the key file
    pub fn env(&self) -> (String, String) {
        (
            CREDENTIALS_ENV.to_string(),
            self.key_file.display().to_string(),
        )
    }
}

/// Write the secret verbatim to a new owner-only temporary file
pub fn write_key_file(secret: &str) -> Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix("auth-key")
        .suffix(".json")
        .tempfile()
        .map_err(PluginError::CredentialFile)?;

    file.write_all(secret.as_bytes())
        .and_then(|()| file.flush())
        .map_err(PluginError::CredentialFile)?;

    Ok(file.into_temp_path())
}

/// The three `gcloud` calls that authenticate the session, in order
pub fn provisioning_commands(
    config: &PluginConfig,
    tools: &Toolchain,
    key_file: &Path,
) -> Vec<CommandSpec> {
    let gcloud = || CommandSpec::new(&tools.gcloud).inherit_stdio(config.debug);

    vec![
        // authorization
        gcloud().args([
            "auth".to_string(),
            "activate-service-account".to_string(),
            format!("--key-file={}", key_file.display()),
        ]),
        // project configuration
        gcloud().args(["config", "set", "project", config.project.as_str()]),
        // cluster configuration
        gcloud().args([
            "container",
            "clusters",
            "get-credentials",
            config.cluster.as_str(),
            "--zone",
            config.zone.as_str(),
        ]),
    ]
}

/// Authenticate against the project and fetch cluster credentials.
///
/// Returns `None` without running anything when no key is configured and no
/// `deploy` stage needs the cluster. A `deploy` without a key is a missing
/// `AUTH_KEY` setting. Any failing step aborts provisioning; the caller
/// retries it as a whole.
pub fn provision<R: CommandRunner>(
    runner: &R,
    config: &PluginConfig,
    tools: &Toolchain,
) -> Result<Option<Credentials>> {
    if config.auth_key.is_empty() {
        if config.actions.contains(&Action::Deploy) {
            return Err(PluginError::MissingSetting {
                key: "AUTH_KEY".to_string(),
            });
        }
        tracing::info!("no auth key configured, skipping cluster authentication");
        return Ok(None);
    }

    let key_file = write_key_file(&config.auth_key)?;
    for cmd in provisioning_commands(config, tools, &key_file) {
        runner.run(&cmd)?;
    }

    tracing::info!(
        project = %config.project,
        cluster = %config.cluster,
        zone = %config.zone,
        "authenticated against cluster"
    );
    Ok(Some(Credentials { key_file }))
}

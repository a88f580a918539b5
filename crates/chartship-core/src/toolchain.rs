//! Locations of the external programs

use std::path::PathBuf;

use crate::config::Settings;

pub const GCLOUD_BIN: &str = "/opt/google-cloud-sdk/bin/gcloud";
pub const GSUTIL_BIN: &str = "/opt/google-cloud-sdk/bin/gsutil";
pub const KUBECTL_BIN: &str = "/opt/google-cloud-sdk/bin/kubectl";
pub const HELM_BIN: &str = "/opt/google-cloud-sdk/bin/helm";

/// Paths of the four tools a run shells out to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub gcloud: PathBuf,
    pub gsutil: PathBuf,
    pub kubectl: PathBuf,
    pub helm: PathBuf,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            gcloud: PathBuf::from(GCLOUD_BIN),
            gsutil: PathBuf::from(GSUTIL_BIN),
            kubectl: PathBuf::from(KUBECTL_BIN),
            helm: PathBuf::from(HELM_BIN),
        }
    }
}

impl Toolchain {
    /// Default image layout, with `*_BIN` settings taking precedence
    pub fn load<F>(settings: &Settings<F>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let pick = |key: &str, default: PathBuf| {
            settings.get(key).map(PathBuf::from).unwrap_or(default)
        };

        Self {
            gcloud: pick("GCLOUD_BIN", defaults.gcloud),
            gsutil: pick("GSUTIL_BIN", defaults.gsutil),
            kubectl: pick("KUBECTL_BIN", defaults.kubectl),
            helm: pick("HELM_BIN", defaults.helm),
        }
    }
}

//! Defaults derived from other settings

use crate::config::PluginConfig;
use crate::error::{PluginError, Result};

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// Extension `helm package` gives its archives
pub const ARCHIVE_EXTENSION: &str = "tgz";

/// Public URL of a chart repository served from a storage bucket
pub fn chart_repo_url(bucket: &str) -> String {
    format!("https://{}.storage.googleapis.com/", bucket)
}

/// `gsutil` address of a storage bucket
pub fn bucket_url(bucket: &str) -> String {
    format!("gs://{}", bucket)
}

/// Last `/`-separated segment of a path.
///
/// A trailing slash yields an empty segment.
pub fn last_path_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl PluginConfig {
    /// Fill unset fields from other fields.
    ///
    /// Rules apply in order: package from the chart path, release from the
    /// package, chart repository from the bucket, then the namespace.
    /// Applying this twice is the same as applying it once.
    pub fn resolve_defaults(&mut self) {
        if self.package.is_empty() {
            self.package = last_path_segment(&self.chart_path).to_string();
        }
        if self.release.is_empty() {
            self.release = self.package.clone();
        }
        if self.chart_repo.is_empty() && !self.bucket.is_empty() {
            self.chart_repo = chart_repo_url(&self.bucket);
        }
        if self.namespace.is_empty() {
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
    }

    /// Check the invariants that must hold after [`resolve_defaults`](Self::resolve_defaults)
    pub fn validate_resolved(&self) -> Result<()> {
        if self.package.is_empty() {
            return Err(PluginError::invalid_config(format!(
                "cannot derive a package name from chart path '{}'",
                self.chart_path
            )));
        }
        if self.release.is_empty() {
            return Err(PluginError::invalid_config("release name is empty"));
        }
        Ok(())
    }

    /// File name `helm package` produces: `<package>-<version>.tgz`
    pub fn archive_name(&self) -> String {
        format!(
            "{}-{}.{}",
            self.package, self.chart_version, ARCHIVE_EXTENSION
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chart_path: &str) -> PluginConfig {
        PluginConfig {
            chart_path: chart_path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_package_from_chart_path() {
        for (path, expected) in [
            ("/charts/myapp", "myapp"),
            ("charts/nested/api", "api"),
            ("standalone", "standalone"),
        ] {
            let mut c = config(path);
            c.resolve_defaults();
            assert_eq!(c.package, expected);
            assert_eq!(c.release, expected);
        }
    }

    #[test]
    fn test_trailing_slash_yields_empty_package() {
        let mut c = config("charts/myapp/");
        c.resolve_defaults();
        assert_eq!(c.package, "");
        assert!(matches!(
            c.validate_resolved(),
            Err(PluginError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_explicit_names_are_kept() {
        let mut c = config("/charts/myapp");
        c.package = "frontend".to_string();
        c.resolve_defaults();
        assert_eq!(c.package, "frontend");
        assert_eq!(c.release, "frontend");

        let mut c = config("/charts/myapp");
        c.release = "myapp-canary".to_string();
        c.resolve_defaults();
        assert_eq!(c.package, "myapp");
        assert_eq!(c.release, "myapp-canary");
    }

    #[test]
    fn test_chart_repo_from_bucket() {
        let mut c = config("/charts/myapp");
        c.bucket = "my-bucket".to_string();
        c.resolve_defaults();
        assert_eq!(c.chart_repo, "https://my-bucket.storage.googleapis.com/");

        let mut c = config("/charts/myapp");
        c.bucket = "my-bucket".to_string();
        c.chart_repo = "https://charts.example.com/".to_string();
        c.resolve_defaults();
        assert_eq!(c.chart_repo, "https://charts.example.com/");

        let mut c = config("/charts/myapp");
        c.resolve_defaults();
        assert_eq!(c.chart_repo, "");
    }

    #[test]
    fn test_namespace_default() {
        let mut c = config("/charts/myapp");
        c.resolve_defaults();
        assert_eq!(c.namespace, "default");

        let mut c = config("/charts/myapp");
        c.namespace = "staging".to_string();
        c.resolve_defaults();
        assert_eq!(c.namespace, "staging");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut once = config("/charts/myapp");
        once.bucket = "my-bucket".to_string();
        once.resolve_defaults();

        let mut twice = once.clone();
        twice.resolve_defaults();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_archive_name() {
        let mut c = config("/charts/myapp");
        c.chart_version = "1.2.3".to_string();
        c.resolve_defaults();
        assert_eq!(c.archive_name(), "myapp-1.2.3.tgz");
    }

    #[test]
    fn test_bucket_url() {
        assert_eq!(bucket_url("my-bucket"), "gs://my-bucket");
    }
}

//! Run orchestration
//!
//! A run has two retried phases:
//!
//! 1. **Prepare** - resolve defaults, provision credentials, `helm init`.
//!    Retried once after [`RetryPolicy::PREPARE_DELAY`].
//! 2. **Execute** - the declared stages in order, stopping at the first
//!    failure. Retried once, immediately.
//!
//! A second failure of either phase ends the run.

use crate::actions::{self, StageContext};
use crate::config::{Action, PluginConfig};
use crate::credentials::{self, Credentials};
use crate::error::{Phase, Result};
use crate::retry::RetryPolicy;
use crate::runner::CommandRunner;
use crate::toolchain::Toolchain;

/// Output of a successful prepare phase
#[derive(Debug)]
pub struct Session {
    /// Configuration with defaults resolved
    pub config: PluginConfig,
    /// Activated key, if one was configured
    pub credentials: Option<Credentials>,
}

/// Drives a run from configuration to the last stage
pub struct Dispatcher<R> {
    config: PluginConfig,
    tools: Toolchain,
    runner: R,
    prepare_policy: RetryPolicy,
    execute_policy: RetryPolicy,
}

impl<R: CommandRunner> Dispatcher<R> {
    pub fn new(config: PluginConfig, runner: R) -> Self {
        Self {
            config,
            tools: Toolchain::default(),
            runner,
            prepare_policy: RetryPolicy::prepare(),
            execute_policy: RetryPolicy::execute(),
        }
    }

    #[must_use]
    pub fn with_toolchain(mut self, tools: Toolchain) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn with_policies(mut self, prepare: RetryPolicy, execute: RetryPolicy) -> Self {
        self.prepare_policy = prepare;
        self.execute_policy = execute;
        self
    }

    /// Resolve defaults, authenticate and initialize helm.
    ///
    /// Works on a copy of the configuration so a retried attempt starts from
    /// the same input.
    pub fn prepare(&self) -> Result<Session> {
        let mut config = self.config.clone();
        config.resolve_defaults();
        config.validate_resolved()?;
        tracing::debug!(?config, "resolved configuration");

        let credentials = credentials::provision(&self.runner, &config, &self.tools)?;

        let ctx = StageContext::new(&config, &self.tools, credentials.as_ref());
        actions::run_init(&self.runner, &ctx)?;

        Ok(Session {
            config,
            credentials,
        })
    }

    /// Run every declared stage in order, stopping at the first failure
    pub fn execute(&self, session: &Session) -> Result<()> {
        let ctx = StageContext::new(
            &session.config,
            &self.tools,
            session.credentials.as_ref(),
        );

        for &action in &session.config.actions {
            tracing::info!(%action, "running stage");
            actions::run_action(&self.runner, &ctx, action)?;
        }
        Ok(())
    }

    /// Prepare, then execute, each under its retry policy
    pub fn run(&self) -> Result<()> {
        for action in stages_without_archive(&self.config.actions) {
            tracing::warn!(
                %action,
                "stage uses the packaged chart but no create stage runs before it"
            );
        }

        let session = self
            .prepare_policy
            .run(Phase::Prepare, |_| self.prepare())?;
        self.execute_policy
            .run(Phase::Execute, |_| self.execute(&session))?;

        tracing::info!("all stages completed");
        Ok(())
    }
}

/// Stages that consume the archive without a `create` earlier in the list.
///
/// These still run; the archive may have been produced by an earlier step.
pub fn stages_without_archive(actions: &[Action]) -> Vec<Action> {
    let mut created = false;
    let mut missing = Vec::new();
    for &action in actions {
        match action {
            Action::Create => created = true,
            a if a.needs_archive() && !created => missing.push(a),
            _ => {}
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;
    use crate::runner::RecordingRunner;

    fn scenario() -> PluginConfig {
        PluginConfig {
            actions: vec![Action::Create, Action::Publish, Action::Deploy],
            auth_key: "{\"type\":\"service_account\"}".to_string(),
            project: "acme".to_string(),
            cluster: "prod".to_string(),
            zone: "europe-west1-b".to_string(),
            bucket: "my-bucket".to_string(),
            chart_path: "/charts/myapp".to_string(),
            chart_version: "1.2.3".to_string(),
            ..Default::default()
        }
    }

    fn no_delay() -> RetryPolicy {
        RetryPolicy::once_after(std::time::Duration::ZERO)
    }

    fn dispatcher(config: PluginConfig, runner: &RecordingRunner) -> Dispatcher<&RecordingRunner> {
        Dispatcher::new(config, runner).with_policies(no_delay(), no_delay())
    }

    #[test]
    fn test_full_run() {
        let runner = RecordingRunner::new();
        dispatcher(scenario(), &runner).run().unwrap();

        let lines = runner.short_command_lines();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("gcloud auth activate-service-account --key-file="));
        assert_eq!(
            lines[1..],
            [
                "gcloud config set project acme",
                "gcloud container clusters get-credentials prod --zone europe-west1-b",
                "helm init --client-only",
                "helm package --version 1.2.3 /charts/myapp",
                "gsutil cp myapp-1.2.3.tgz gs://my-bucket",
                "helm upgrade myapp myapp-1.2.3.tgz --set namespace=default --install --namespace default",
            ]
        );
    }

    #[test]
    fn test_stages_run_in_declared_order() {
        let runner = RecordingRunner::new();
        let config = PluginConfig {
            actions: vec![Action::Deploy, Action::Create],
            ..scenario()
        };
        dispatcher(config, &runner).run().unwrap();

        let helm: Vec<_> = runner
            .short_command_lines()
            .into_iter()
            .filter(|line| line.starts_with("helm "))
            .collect();
        assert_eq!(
            helm,
            vec![
                "helm init --client-only",
                "helm upgrade myapp myapp-1.2.3.tgz --set namespace=default --install --namespace default",
                "helm package --version 1.2.3 /charts/myapp",
            ]
        );
    }

    #[test]
    fn test_deploy_without_create_is_attempted() {
        let runner = RecordingRunner::new();
        let config = PluginConfig {
            actions: vec![Action::Deploy],
            ..scenario()
        };
        dispatcher(config, &runner).run().unwrap();

        assert_eq!(runner.count_matching("helm package"), 0);
        assert_eq!(runner.count_matching("helm upgrade myapp myapp-1.2.3.tgz"), 1);
    }

    #[test]
    fn test_prepare_recovers_after_one_failure() {
        let runner = RecordingRunner::new().fail_when("activate-service-account", 1);
        dispatcher(scenario(), &runner).run().unwrap();

        assert_eq!(runner.count_matching("activate-service-account"), 2);
        assert_eq!(runner.count_matching("helm upgrade"), 1);
    }

    #[test]
    fn test_prepare_fails_twice_never_executes() {
        let runner = RecordingRunner::new().fail_when("helm init", 2);
        let err = dispatcher(scenario(), &runner).run().unwrap_err();

        assert!(matches!(
            err,
            PluginError::Exhausted { phase: Phase::Prepare, attempts: 2, .. }
        ));
        assert_eq!(runner.count_matching("helm init"), 2);
        assert_eq!(runner.count_matching("helm package"), 0);
        assert_eq!(runner.count_matching("gsutil"), 0);
    }

    #[test]
    fn test_execute_retries_whole_phase() {
        let runner = RecordingRunner::new().fail_when("gsutil cp", 1);
        dispatcher(scenario(), &runner).run().unwrap();

        // create runs again because the whole phase is retried
        assert_eq!(runner.count_matching("helm package"), 2);
        assert_eq!(runner.count_matching("gsutil cp"), 2);
        assert_eq!(runner.count_matching("helm upgrade"), 1);
        // prepare is not repeated
        assert_eq!(runner.count_matching("helm init"), 1);
    }

    #[test]
    fn test_execute_fails_twice() {
        let runner = RecordingRunner::new().fail_when("helm package", 2);
        let err = dispatcher(scenario(), &runner).run().unwrap_err();

        assert!(matches!(
            err,
            PluginError::Exhausted { phase: Phase::Execute, attempts: 2, .. }
        ));
        // stops at the first failing stage each time
        assert_eq!(runner.count_matching("gsutil"), 0);
        assert_eq!(runner.count_matching("helm upgrade"), 0);
    }

    #[test]
    fn test_retried_deploy_appends_namespace_once() {
        let runner = RecordingRunner::new().fail_when("helm upgrade", 1);
        let config = PluginConfig {
            actions: vec![Action::Deploy],
            values: vec!["image.tag=abc".to_string()],
            namespace: "staging".to_string(),
            ..scenario()
        };
        dispatcher(config, &runner).run().unwrap();

        let deploys: Vec<_> = runner
            .calls()
            .into_iter()
            .filter(|c| c.args.first().map(String::as_str) == Some("upgrade"))
            .collect();
        assert_eq!(deploys.len(), 2);
        for deploy in deploys {
            assert_eq!(deploy.args[4], "image.tag=abc,namespace=staging");
        }
    }

    #[test]
    fn test_deploy_without_auth_key_is_a_config_error() {
        let runner = RecordingRunner::new();
        let config = PluginConfig {
            actions: vec![Action::Deploy],
            auth_key: String::new(),
            ..scenario()
        };
        let err = dispatcher(config, &runner).run().unwrap_err();

        assert!(matches!(err, PluginError::MissingSetting { key } if key == "AUTH_KEY"));
        // neither helm init nor the upgrade may run against an unknown cluster
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_create_and_publish_run_without_auth_key() {
        let runner = RecordingRunner::new();
        let config = PluginConfig {
            actions: vec![Action::Create, Action::Publish],
            auth_key: String::new(),
            ..scenario()
        };
        dispatcher(config, &runner).run().unwrap();

        assert_eq!(runner.count_matching("gcloud"), 0);
        assert_eq!(
            runner.short_command_lines(),
            vec![
                "helm init --client-only",
                "helm package --version 1.2.3 /charts/myapp",
                "gsutil cp myapp-1.2.3.tgz gs://my-bucket",
            ]
        );
    }

    #[test]
    fn test_invalid_package_is_not_retried() {
        let runner = RecordingRunner::new();
        let config = PluginConfig {
            chart_path: "charts/".to_string(),
            ..scenario()
        };
        let err = dispatcher(config, &runner).run().unwrap_err();

        assert!(matches!(err, PluginError::InvalidConfig { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_credentials_reach_stage_commands() {
        let runner = RecordingRunner::new();
        dispatcher(scenario(), &runner).run().unwrap();

        let calls = runner.calls();
        let key_file = calls[0].args[2].trim_start_matches("--key-file=").to_string();
        let deploy = calls.last().unwrap();
        assert_eq!(
            deploy.env_value("GOOGLE_APPLICATION_CREDENTIALS"),
            Some(key_file.as_str())
        );
        // removed once the run is over
        assert!(!std::path::Path::new(&key_file).exists());
    }

    #[test]
    fn test_stages_without_archive() {
        assert!(stages_without_archive(&[Action::Create, Action::Publish, Action::Deploy]).is_empty());
        assert_eq!(
            stages_without_archive(&[Action::Deploy]),
            vec![Action::Deploy]
        );
        assert_eq!(
            stages_without_archive(&[Action::Publish, Action::Create, Action::Deploy]),
            vec![Action::Publish]
        );
    }
}

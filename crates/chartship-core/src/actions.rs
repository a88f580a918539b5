//! Stage handlers
//!
//! Each stage builds its argument vector purely from the resolved
//! configuration and runs it; success is the tool's exit status.

use crate::config::{Action, PluginConfig};
use crate::credentials::Credentials;
use crate::error::Result;
use crate::resolve::bucket_url;
use crate::runner::{CommandRunner, CommandSpec};
use crate::toolchain::Toolchain;

/// Everything a stage needs to build its command
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub config: &'a PluginConfig,
    pub tools: &'a Toolchain,
    pub credentials: Option<&'a Credentials>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        config: &'a PluginConfig,
        tools: &'a Toolchain,
        credentials: Option<&'a Credentials>,
    ) -> Self {
        Self {
            config,
            tools,
            credentials,
        }
    }

    /// Base command: debug output policy plus the key file location
    fn command(&self, program: &std::path::Path) -> CommandSpec {
        let cmd = CommandSpec::new(program).inherit_stdio(self.config.debug);
        match self.credentials {
            Some(creds) => {
                let (key, value) = creds.env();
                cmd.env(key, value)
            }
            None => cmd,
        }
    }
}

/// `helm init --client-only`
pub fn init_command(ctx: &StageContext<'_>) -> CommandSpec {
    ctx.command(&ctx.tools.helm).args(["init", "--client-only"])
}

/// `helm package --version <version> <chart path>`
pub fn create_command(ctx: &StageContext<'_>) -> CommandSpec {
    ctx.command(&ctx.tools.helm).args([
        "package",
        "--version",
        ctx.config.chart_version.as_str(),
        ctx.config.chart_path.as_str(),
    ])
}

/// `gsutil cp <package>-<version>.tgz gs://<bucket>`
pub fn publish_command(ctx: &StageContext<'_>) -> CommandSpec {
    ctx.command(&ctx.tools.gsutil).args([
        "cp".to_string(),
        ctx.config.archive_name(),
        bucket_url(&ctx.config.bucket),
    ])
}

/// Overrides for `helm upgrade --set`: the configured values followed by
/// `namespace=<namespace>`
pub fn deploy_overrides(config: &PluginConfig) -> Vec<String> {
    config
        .values
        .iter()
        .cloned()
        .chain(std::iter::once(format!("namespace={}", config.namespace)))
        .collect()
}

/// `helm upgrade <release> <archive> --set <overrides> --install --namespace <namespace>`
pub fn deploy_command(ctx: &StageContext<'_>) -> CommandSpec {
    ctx.command(&ctx.tools.helm).args([
        "upgrade".to_string(),
        ctx.config.release.clone(),
        ctx.config.archive_name(),
        "--set".to_string(),
        deploy_overrides(ctx.config).join(","),
        "--install".to_string(),
        "--namespace".to_string(),
        ctx.config.namespace.clone(),
    ])
}

/// `kubectl config view`, always attached to our stdout
pub fn kube_config_command(ctx: &StageContext<'_>) -> CommandSpec {
    ctx.command(&ctx.tools.kubectl)
        .args(["config", "view"])
        .inherit_stdio(true)
}

/// Initialize the helm client
pub fn run_init<R: CommandRunner>(runner: &R, ctx: &StageContext<'_>) -> Result<()> {
    runner.run(&init_command(ctx))
}

/// Run a single stage
pub fn run_action<R: CommandRunner>(
    runner: &R,
    ctx: &StageContext<'_>,
    action: Action,
) -> Result<()> {
    match action {
        Action::Create => runner.run(&create_command(ctx)),
        Action::Publish => runner.run(&publish_command(ctx)),
        Action::Deploy => {
            if ctx.config.debug {
                runner.run(&kube_config_command(ctx))?;
            }
            runner.run(&deploy_command(ctx))
        }
    }
}

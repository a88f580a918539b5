//! chartship - package, publish and deploy a Helm chart from a CI pipeline step
//!
//! All settings come from the environment (`PLUGIN_<NAME>` or `<NAME>`); the
//! command line only carries a couple of local conveniences.

use std::path::PathBuf;
use std::process::ExitCode;

use chartship_core::{Dispatcher, PluginConfig, ProcessRunner, Settings, Toolchain};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod exit_codes;

use error::{CliError, Result};

/// Variable holding a log filter that overrides the DEBUG-based default
const LOG_ENV: &str = "CHARTSHIP_LOG";

#[derive(Parser)]
#[command(name = "chartship")]
#[command(author = "Chartship Contributors")]
#[command(version)]
#[command(
    about = "Package, publish and deploy a Helm chart to GKE",
    long_about = "Package, publish and deploy a Helm chart to GKE.\n\n\
        Settings are read from PLUGIN_<NAME> (or <NAME>) environment variables: \
        ACTIONS, CHART_PATH, CHART_VERSION, AUTH_KEY, PROJECT, CLUSTER, ZONE, \
        NAMESPACE, BUCKET, CHART_REPO, PACKAGE, RELEASE, VALUES, DEBUG, SHOW_ENV."
)]
struct Cli {
    /// Load settings from a dotenv file first (default: ENV_FILE setting)
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Enable debug output (same as PLUGIN_DEBUG=true)
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env();

    // Variables already present in the environment win over the file
    let env_file = cli
        .env_file
        .or_else(|| settings.get("ENV_FILE").map(PathBuf::from));
    if let Some(path) = env_file {
        dotenvy::from_path(&path).map_err(|e| CliError::env_file(&path, e))?;
    }

    let mut config = PluginConfig::load(&settings)?;
    config.debug |= cli.debug;

    init_logging(config.debug);

    if config.show_env {
        for (key, _) in std::env::vars_os() {
            println!("{}", key.to_string_lossy());
        }
    }

    let tools = Toolchain::load(&settings);
    tracing::debug!(?tools, "using toolchain");

    Dispatcher::new(config, ProcessRunner)
        .with_toolchain(tools)
        .run()?;

    Ok(())
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var(LOG_ENV).unwrap_or_else(|_| default_filter.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

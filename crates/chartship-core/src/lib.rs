//! Chartship Core - orchestration for a chart deployment pipeline step
//!
//! This crate provides everything the `chartship` binary needs to turn a
//! declarative, environment-sourced configuration into an ordered series of
//! `gcloud`, `gsutil`, `kubectl` and `helm` invocations:
//! - `PluginConfig`: Settings loaded from `PLUGIN_*` (or bare) environment variables
//! - `Action`: The closed set of pipeline stages (create, publish, deploy)
//! - `CommandRunner`: The seam between argument vectors and real processes
//! - `Credentials`: Service-account key file scoped to a single run
//! - `RetryPolicy`: Bounded retry applied to the prepare and execute phases
//! - `Dispatcher`: Resolves defaults, provisions credentials and runs the stages
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartship_core::{Dispatcher, PluginConfig, ProcessRunner, Settings, Toolchain};
//!
//! # fn example() -> chartship_core::Result<()> {
//! let settings = Settings::from_env();
//! let config = PluginConfig::load(&settings)?;
//!
//! Dispatcher::new(config, ProcessRunner)
//!     .with_toolchain(Toolchain::load(&settings))
//!     .run()?;
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod resolve;
pub mod retry;
pub mod runner;
pub mod toolchain;

pub use actions::StageContext;
pub use config::{Action, ENV_PREFIX, PluginConfig, Settings};
pub use credentials::{CREDENTIALS_ENV, Credentials};
pub use dispatcher::{Dispatcher, Session};
pub use error::{Phase, PluginError, Result};
pub use retry::RetryPolicy;
pub use runner::{CommandRunner, CommandSpec, ProcessRunner, RecordingRunner};
pub use toolchain::Toolchain;

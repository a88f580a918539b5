//! CLI error types with exit code handling
//!
//! Maps pipeline errors to diagnostics and to the exit code the outer
//! pipeline sees.

use std::path::Path;

use chartship_core::{Phase, PluginError};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

const SETTINGS_HELP: &str =
    "Settings are read from PLUGIN_<NAME> environment variables, falling back to <NAME>";

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Settings are missing or invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(chartship::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The env file could not be loaded
    #[error("Failed to load env file {path}: {message}")]
    #[diagnostic(code(chartship::cli::env_file))]
    EnvFile { path: String, message: String },

    /// Authentication or helm initialization failed on every attempt
    #[error("Failed to prepare plugin: {source}")]
    #[diagnostic(
        code(chartship::cli::prepare),
        help("Check AUTH_KEY, PROJECT, CLUSTER and ZONE, and that the service account has access to the cluster")
    )]
    Prepare {
        #[source]
        source: PluginError,
    },

    /// A stage failed on every attempt
    #[error("Failed to execute plugin: {source}")]
    #[diagnostic(
        code(chartship::cli::execute),
        help("Set PLUGIN_DEBUG=true to see the output of every command")
    )]
    Execute {
        #[source]
        source: PluginError,
    },

    /// Anything else
    #[error("{0}")]
    #[diagnostic(code(chartship::cli::error))]
    Other(#[source] PluginError),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } | CliError::EnvFile { .. } => exit_codes::CONFIG_ERROR,
            CliError::Prepare { .. } => exit_codes::PREPARE_FAILED,
            CliError::Execute { .. } => exit_codes::EXECUTE_FAILED,
            CliError::Other(_) => exit_codes::ERROR,
        }
    }

    /// Create an env file error
    pub fn env_file(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::EnvFile {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<PluginError> for CliError {
    fn from(err: PluginError) -> Self {
        if err.is_config() {
            return CliError::Config {
                message: err.to_string(),
                help: Some(SETTINGS_HELP.to_string()),
            };
        }
        match err {
            PluginError::Exhausted {
                phase: Phase::Prepare,
                ..
            } => CliError::Prepare { source: err },
            PluginError::Exhausted {
                phase: Phase::Execute,
                ..
            } => CliError::Execute { source: err },
            other => CliError::Other(other),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

//! Error types for pipeline operations

use std::fmt;

use thiserror::Error;

/// The two retried phases of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Default resolution, credential provisioning and `helm init`
    Prepare,
    /// The declared stages, in order
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prepare => f.write_str("prepare"),
            Phase::Execute => f.write_str("execute"),
        }
    }
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PluginError {
    // ============ Configuration Errors ============
    #[error("Missing required setting: {key}")]
    MissingSetting { key: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidSetting { key: String, message: String },

    #[error("Unknown action: {name}")]
    UnknownAction { name: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ Command Errors ============
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed with {}", exit_description(.code))]
    CommandFailed { program: String, code: Option<i32> },

    // ============ Credential Errors ============
    #[error("Failed to write credential key file: {0}")]
    CredentialFile(#[source] std::io::Error),

    // ============ Retry ============
    #[error("{phase} phase failed after {attempts} attempt(s): {source}")]
    Exhausted {
        phase: Phase,
        attempts: u32,
        #[source]
        source: Box<PluginError>,
    },
}

impl PluginError {
    /// Whether a second attempt of the surrounding phase could succeed.
    ///
    /// Configuration errors fail identically every time, so they are surfaced
    /// immediately instead of being retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            PluginError::MissingSetting { .. }
            | PluginError::InvalidSetting { .. }
            | PluginError::UnknownAction { .. }
            | PluginError::InvalidConfig { .. }
            | PluginError::Exhausted { .. } => false,
            PluginError::Spawn { .. }
            | PluginError::CommandFailed { .. }
            | PluginError::CredentialFile(_) => true,
        }
    }

    /// Whether this error comes from the settings rather than the environment
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            PluginError::MissingSetting { .. }
                | PluginError::InvalidSetting { .. }
                | PluginError::UnknownAction { .. }
                | PluginError::InvalidConfig { .. }
        )
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PluginError>;

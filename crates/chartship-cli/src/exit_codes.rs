//! Standard exit codes for a pipeline run
//!
//! The outer pipeline only distinguishes zero from non-zero; the specific
//! codes make the failing phase visible in CI logs.

/// Success - every stage completed
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - missing, malformed or unknown settings
pub const CONFIG_ERROR: i32 = 2;

/// Prepare failed - authentication or helm initialization failed twice
pub const PREPARE_FAILED: i32 = 3;

/// Execute failed - a stage failed on both attempts
pub const EXECUTE_FAILED: i32 = 4;

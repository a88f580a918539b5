//! Bounded retry around a whole phase

use std::thread;
use std::time::Duration;

use crate::error::{Phase, PluginError, Result};

/// How often, and how patiently, a phase is attempted.
///
/// Only errors that [`PluginError::is_retryable`] accepts are retried;
/// configuration errors come back untouched on the first attempt. When the
/// attempts run out the last error is wrapped in [`PluginError::Exhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Pause before the second prepare attempt, for token propagation
    pub const PREPARE_DELAY: Duration = Duration::from_secs(10);

    /// Two attempts with `delay` between them
    pub fn once_after(delay: Duration) -> Self {
        Self {
            max_attempts: 2,
            delay,
        }
    }

    /// A single attempt
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Policy for the prepare phase
    pub fn prepare() -> Self {
        Self::once_after(Self::PREPARE_DELAY)
    }

    /// Policy for the execute phase
    pub fn execute() -> Self {
        Self::once_after(Duration::ZERO)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up. `op` receives the 1-based attempt number.
    pub fn run<T, F>(&self, phase: Phase, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= max_attempts => {
                    return Err(PluginError::Exhausted {
                        phase,
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    if self.delay.is_zero() {
                        tracing::warn!(%phase, attempt, error = %err, "{} failed, retrying", phase);
                    } else {
                        tracing::warn!(
                            %phase,
                            attempt,
                            error = %err,
                            "{} failed, waiting {}s and retrying",
                            phase,
                            self.delay.as_secs()
                        );
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::execute()
    }
}

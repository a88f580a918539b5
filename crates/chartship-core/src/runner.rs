//! Command specification and execution
//!
//! Every external program goes through [`CommandSpec`] and a
//! [`CommandRunner`]. Arguments are discrete elements, never shell strings.
//! [`ProcessRunner`] executes them for real; [`RecordingRunner`] records them
//! so tests can assert on the exact argument vectors.

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{PluginError, Result};

/// A single external invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to execute
    pub program: PathBuf,
    /// Arguments as discrete elements
    pub args: Vec<String>,
    /// Environment overrides on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Attach our stdout/stderr instead of discarding the output
    pub inherit_stdio: bool,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            inherit_stdio: false,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn inherit_stdio(mut self, inherit: bool) -> Self {
        self.inherit_stdio = inherit;
        self
    }

    /// File name of the program, used in error messages
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Program followed by its arguments
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Space-joined [`argv`](Self::argv), for logs and assertions
    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }

    /// Value of an environment override
    #[cfg(test)]
    pub(crate) fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Runs a [`CommandSpec`] to completion
pub trait CommandRunner {
    /// Block until the program exits; a non-zero status is an error
    fn run(&self, spec: &CommandSpec) -> Result<()>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, spec: &CommandSpec) -> Result<()> {
        (**self).run(spec)
    }
}

/// Runs commands as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<()> {
        tracing::debug!(cmd = ?spec.argv(), "running command");

        let mut command = Command::new(&spec.program);
        command.args(&spec.args).stdin(Stdio::null());
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        if spec.inherit_stdio {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = command.status().map_err(|source| PluginError::Spawn {
            program: spec.program_name(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(PluginError::CommandFailed {
                program: spec.program_name(),
                code: status.code(),
            })
        }
    }
}

/// A scripted failure: calls whose command line contains `pattern` fail
/// `remaining` more times
#[derive(Debug, Clone)]
struct ScriptedFailure {
    pattern: String,
    remaining: usize,
}

/// In-memory runner for tests.
///
/// Records every command instead of executing it. Failures can be scripted
/// per command-line substring.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<CommandSpec>>,
    failures: RefCell<Vec<ScriptedFailure>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` commands whose command line contains `pattern`
    pub fn fail_when(self, pattern: impl Into<String>, times: usize) -> Self {
        self.failures.borrow_mut().push(ScriptedFailure {
            pattern: pattern.into(),
            remaining: times,
        });
        self
    }

    /// Every command received so far, in order
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Number of received commands whose command line contains `pattern`
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.command_line().contains(pattern))
            .count()
    }

    /// Command lines with the program reduced to its file name
    pub fn short_command_lines(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|c| {
                std::iter::once(c.program_name())
                    .chain(c.args.iter().cloned())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<()> {
        self.calls.borrow_mut().push(spec.clone());

        let line = spec.command_line();
        let mut failures = self.failures.borrow_mut();
        if let Some(failure) = failures
            .iter_mut()
            .find(|f| f.remaining > 0 && line.contains(&f.pattern))
        {
            failure.remaining -= 1;
            return Err(PluginError::CommandFailed {
                program: spec.program_name(),
                code: Some(1),
            });
        }
        Ok(())
    }
}

//! Command output and error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for command execution
///
/// Only failures to run the command at all end up here; a command that ran
/// and exited non-zero is reported through [`CommandOutput`].
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("`{program}` timed out after {secs} seconds")]
    Timeout { program: String, secs: u64 },

    #[error("`{program}` produced non UTF-8 output")]
    Encoding { program: String },
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::new(stdout, "", 0)
    }

    /// Failed output with the given stderr
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self::new("", stderr, 1)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Whether the output reports a missing object rather than a real error.
    pub fn is_not_found(&self) -> bool {
        let mentions = |s: &str| s.contains("NotFound") || s.contains("not found");
        mentions(&self.stderr) || mentions(&self.stdout)
    }

    /// One-line summary of stderr and stdout for error messages.
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        let stdout = self.stdout.trim();
        match (stderr.is_empty(), stdout.is_empty()) {
            (true, true) => format!("exit code {}", self.exit_code),
            (false, true) => stderr.to_string(),
            (true, false) => stdout.to_string(),
            (false, false) => format!("{}\n{}", stderr, stdout),
        }
    }
}

//! Command execution for the external CLIs the pipeline drives
//! (`kubectl`, `gcloud`, `crane`).

pub mod config;
pub mod output;
pub mod subprocess;

use async_trait::async_trait;
pub use config::RunnerConfig;
pub use output::{CommandError, CommandOutput};
pub use subprocess::SubprocessRunner;

/// A single external command: program, argument vector and optional stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
        }
    }

    /// Attach data to be written to the child's stdin.
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Render the invocation as a shell-like line for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Trait for command execution - lets the pipeline run against a fake executor
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the invocation to completion and capture its output.
    ///
    /// A non-zero exit is NOT an error at this layer; callers inspect
    /// [`CommandOutput::exit_code`].
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;
}

//! Subprocess-backed command runner

use crate::shell::{CommandError, CommandOutput, CommandRunner, Invocation, RunnerConfig};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs invocations as real child processes
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner {
    config: RunnerConfig,
}

impl SubprocessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Get the per-command timeout
    pub fn timeout_secs(&self) -> u64 {
        self.config.timeout_secs
    }

    async fn spawn_and_wait(&self, invocation: &Invocation) -> Result<std::process::Output, CommandError> {
        let spawn_err = |e: std::io::Error| CommandError::Spawn {
            program: invocation.program.clone(),
            reason: e.to_string(),
        };

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(spawn_err)?;

        if let Some(input) = &invocation.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes()).await.map_err(spawn_err)?;
                // Dropping closes the pipe so the child sees EOF
                drop(stdin);
            }
        }

        child.wait_with_output().await.map_err(spawn_err)
    }
}

#[async_trait]
impl CommandRunner for SubprocessRunner {
    /// Run the invocation, enforcing the configured timeout
    ///
    /// # Errors
    /// Returns `CommandError` if:
    /// - The program cannot be spawned
    /// - The command times out
    /// - The output is not valid UTF-8
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        debug!("Executing: {}", invocation.display());

        let output = timeout(
            Duration::from_secs(self.config.timeout_secs),
            self.spawn_and_wait(invocation),
        )
        .await
        .map_err(|_| CommandError::Timeout {
            program: invocation.program.clone(),
            secs: self.config.timeout_secs,
        })??;

        let encoding_err = |_| CommandError::Encoding {
            program: invocation.program.clone(),
        };
        let stdout = String::from_utf8(output.stdout).map_err(encoding_err)?;
        let stderr = String::from_utf8(output.stderr).map_err(encoding_err)?;
        let exit_code = output.status.code().unwrap_or(-1);

        if exit_code != 0 {
            warn!(
                "{} exited with code {}: {}",
                invocation.program,
                exit_code,
                stderr.trim()
            );
        } else {
            debug!("{} returned {} bytes of output", invocation.program, stdout.len());
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

//! Thin `kubectl` wrapper over a [`CommandRunner`]

use crate::shell::{CommandError, CommandOutput, CommandRunner, Invocation};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum KubectlError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("`{command}` failed: {message}")]
    Failed {
        command: String,
        message: String,
        not_found: bool,
    },

    #[error("could not parse output of `{command}`: {message}")]
    Parse { command: String, message: String },
}

impl KubectlError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubectlError::Failed { not_found: true, .. })
    }
}

#[derive(Clone)]
pub struct Kubectl {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl Kubectl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "kubectl".to_string(),
        }
    }

    pub fn invocation(&self, args: &[&str]) -> Invocation {
        Invocation::new(&self.program, args.iter().copied())
    }

    /// Run and return the raw output, whatever the exit code
    pub async fn run(&self, invocation: Invocation) -> Result<CommandOutput, CommandError> {
        debug!(command = %invocation.display(), "Running kubectl");
        self.runner.run(&invocation).await
    }

    /// Run and require a zero exit
    pub async fn run_checked(&self, invocation: Invocation) -> Result<String, KubectlError> {
        let command = invocation.display();
        let output = self.run(invocation).await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(KubectlError::Failed {
                command,
                not_found: output.is_not_found(),
                message: output.diagnostics(),
            })
        }
    }

    /// `kubectl <args>` whose stdout is JSON, decoded into `T`
    pub async fn get_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, KubectlError> {
        let invocation = self.invocation(args);
        let command = invocation.display();
        let stdout = self.run_checked(invocation).await?;
        serde_json::from_str(&stdout).map_err(|e| KubectlError::Parse {
            command,
            message: e.to_string(),
        })
    }
}

//! Pipeline error and warning taxonomy

use crate::shell::CommandError;
use std::fmt;
use thiserror::Error;

/// Fatal errors. Any of these aborts the submission at the stage that raised it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or incomplete input, detected before any external call
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Project resolution or cluster credential setup failed
    #[error("cluster access failed: {0}")]
    ClusterAccess(String),

    /// Controller manifest fetch, parse, apply or rollout failed
    #[error("controller installation failed: {0}")]
    PrerequisiteInstall(String),

    /// The admission webhook never reported a live endpoint
    #[error("timed out waiting for {resource} after {attempts} attempts")]
    ReadinessTimeout { resource: String, attempts: u32 },

    /// Build context archiving, pull, append or push failed
    #[error("image build failed: {0}")]
    ImageBuild(String),

    /// Manifest rendering, writing or apply failed
    #[error("manifest apply failed: {0}")]
    ManifestApply(String),

    /// An external command could not be run at all
    #[error("{context}: {source}")]
    Command {
        context: String,
        #[source]
        source: CommandError,
    },
}

impl PipelineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    /// Wrap a runner failure with the operation it interrupted
    pub fn command(context: impl Into<String>, source: CommandError) -> Self {
        PipelineError::Command {
            context: context.into(),
            source,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, PipelineError::Configuration(_))
    }
}

/// Non-fatal conditions. The stage recovers with a fallback and the run goes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    /// Queue or accelerator discovery was ambiguous or failed
    Resolution(String),
    /// Quota lookup or patch failed; the workload may stay queued
    QuotaPatch(String),
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::Resolution(msg) => write!(f, "resolution: {}", msg),
            PipelineWarning::QuotaPatch(msg) => write!(f, "quota: {}", msg),
        }
    }
}

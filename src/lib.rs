//! workload-submit - submit queue-managed JobSet workloads to GKE clusters

pub mod cli;
pub mod cluster;
pub mod core;
pub mod execution;
pub mod image;
pub mod manifest;
pub mod shell;

// Re-export commonly used types
pub use cluster::{HttpManifestFetcher, ManifestFetcher};
pub use core::{
    PipelineError, PipelineWarning, Settings, SubmissionReport, WorkloadRequest,
};
pub use execution::{PipelineEvent, RetryPolicy, Stage, SubmissionPipeline};
pub use image::{CraneRegistry, Registry};
pub use shell::{CommandRunner, SubprocessRunner};

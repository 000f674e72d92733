//! Stage outcome and run state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Installation state of the JobSet controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    /// CRD is absent
    Uninstalled,
    /// CRD exists but the admission webhook has no live endpoint
    InstalledUnhealthy,
    /// CRD exists and the webhook is serving
    Ready,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Uninstalled => "uninstalled",
            ControllerState::InstalledUnhealthy => "installed-unhealthy",
            ControllerState::Ready => "ready",
        };
        f.write_str(s)
    }
}

/// Result of quota reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaOutcome {
    /// Both resource kinds were already covered; nothing was patched
    AlreadyCovered,
    /// The listed resource kinds were appended
    Extended { added: Vec<String> },
    /// Reconciliation gave up; the run continued anyway
    Skipped { reason: String },
}

impl fmt::Display for QuotaOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaOutcome::AlreadyCovered => f.write_str("already covered"),
            QuotaOutcome::Extended { added } => write!(f, "extended with {}", added.join(", ")),
            QuotaOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
        }
    }
}

/// Where the rendered manifest ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestDestination {
    Applied,
    Written(PathBuf),
}

/// Summary of one submission run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReport {
    /// Unique run ID
    pub run_id: Uuid,

    pub project_id: String,
    pub workload_name: String,
    pub queue: String,

    /// Empty for CPU-only workloads
    pub accelerator: String,

    pub image: String,
    pub controller: ControllerState,
    pub quota: QuotaOutcome,
    pub destination: ManifestDestination,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl SubmissionReport {
    /// Wall-clock duration of the run in seconds
    pub fn elapsed_secs(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

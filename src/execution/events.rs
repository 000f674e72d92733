//! Events emitted while a submission runs

use crate::core::{ControllerState, PipelineWarning, QuotaOutcome};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    ClusterAccess,
    Resolve,
    Quota,
    Prerequisites,
    Image,
    Manifest,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Validate,
        Stage::ClusterAccess,
        Stage::Resolve,
        Stage::Quota,
        Stage::Prerequisites,
        Stage::Image,
        Stage::Manifest,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Validate => "Validating request",
            Stage::ClusterAccess => "Configuring cluster access",
            Stage::Resolve => "Resolving queue and accelerator",
            Stage::Quota => "Reconciling queue quota",
            Stage::Prerequisites => "Ensuring JobSet controller",
            Stage::Image => "Assembling container image",
            Stage::Manifest => "Applying workload manifest",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Events that can occur during a submission
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    PipelineStarted {
        run_id: Uuid,
    },
    StageStarted {
        stage: Stage,
    },
    StageCompleted {
        stage: Stage,
        detail: String,
    },
    Warning {
        stage: Stage,
        warning: PipelineWarning,
    },
    ControllerObserved {
        state: ControllerState,
    },
    ControllerInstalling {
        documents: usize,
    },
    ReadinessPoll {
        attempt: u32,
        max_attempts: u32,
    },
    QuotaReconciled {
        outcome: QuotaOutcome,
    },
    PipelineCompleted {
        run_id: Uuid,
        workload_name: String,
    },
    PipelineFailed {
        run_id: Uuid,
        stage: Stage,
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Fan-out of events to every registered handler
#[derive(Clone, Default)]
pub struct EventSink {
    handlers: Vec<EventHandler>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, handler: F)
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    pub fn emit(&self, event: PipelineEvent) {
        for handler in &self.handlers {
            handler(event.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

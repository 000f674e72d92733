//! Submission pipeline - drives one workload request through every stage

use crate::{
    cluster::{Gcloud, Kubectl, ManifestFetcher, PrerequisiteManager, QuotaReconciler, ResourceResolver},
    core::{PipelineError, PipelineWarning, Settings, SubmissionReport, WorkloadRequest},
    execution::{EventSink, PipelineEvent, Stage},
    image::{ImageAssembler, Registry},
    manifest::{self, ManifestApplier, ManifestInput},
    shell::CommandRunner,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Runs submissions against one cluster toolchain.
///
/// Stages run strictly in order; the first fatal error stops the run and
/// nothing already done is rolled back. Every stage converges, so rerunning
/// a failed submission is safe.
pub struct SubmissionPipeline {
    runner: Arc<dyn CommandRunner>,
    registry: Arc<dyn Registry>,
    fetcher: Arc<dyn ManifestFetcher>,
    settings: Settings,
    events: EventSink,
}

impl SubmissionPipeline {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        registry: Arc<dyn Registry>,
        fetcher: Arc<dyn ManifestFetcher>,
        settings: Settings,
    ) -> Self {
        Self {
            runner,
            registry,
            fetcher,
            settings,
            events: EventSink::new(),
        }
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.events.add(handler);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Submit one workload
    pub async fn submit_job(
        &self,
        request: &WorkloadRequest,
    ) -> Result<SubmissionReport, PipelineError> {
        let run_id = Uuid::new_v4();
        info!("Starting workload submission ({})", run_id);
        self.events.emit(PipelineEvent::PipelineStarted { run_id });

        let mut stage = Stage::Validate;
        match self.run_stages(run_id, request, &mut stage).await {
            Ok(report) => {
                info!(
                    workload = %report.workload_name,
                    elapsed_secs = report.elapsed_secs(),
                    "Workload submission completed"
                );
                self.events.emit(PipelineEvent::PipelineCompleted {
                    run_id,
                    workload_name: report.workload_name.clone(),
                });
                Ok(report)
            }
            Err(e) => {
                error!(stage = ?stage, error = %e, "Workload submission failed");
                self.events.emit(PipelineEvent::PipelineFailed {
                    run_id,
                    stage,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn begin(&self, current: &mut Stage, next: Stage) {
        *current = next;
        info!("{}", next.label());
        self.events.emit(PipelineEvent::StageStarted { stage: next });
    }

    fn complete(&self, stage: Stage, detail: impl Into<String>) {
        self.events.emit(PipelineEvent::StageCompleted {
            stage,
            detail: detail.into(),
        });
    }

    fn warn(&self, stage: Stage, warning: PipelineWarning) {
        warn!(stage = ?stage, "{}", warning);
        self.events.emit(PipelineEvent::Warning { stage, warning });
    }

    async fn run_stages(
        &self,
        run_id: Uuid,
        request: &WorkloadRequest,
        stage: &mut Stage,
    ) -> Result<SubmissionReport, PipelineError> {
        let started_at = Utc::now();
        let kubectl = Kubectl::new(self.runner.clone());

        self.begin(stage, Stage::Validate);
        let image_source = request.validate()?;
        self.complete(Stage::Validate, "request is well-formed");

        self.begin(stage, Stage::ClusterAccess);
        let gcloud = Gcloud::new(self.runner.clone());
        let context = gcloud.resolve_context(&request.cluster).await?;
        gcloud.get_credentials(&context).await?;
        self.complete(Stage::ClusterAccess, context.describe());

        self.begin(stage, Stage::Resolve);
        let resolver = ResourceResolver::new(
            kubectl.clone(),
            &self.settings.namespace,
            &self.settings.default_queue,
        );
        let resolution = resolver.resolve(request).await;
        for warning in resolution.warnings.iter().cloned() {
            self.warn(Stage::Resolve, warning);
        }
        self.complete(
            Stage::Resolve,
            format!(
                "queue {}, accelerator {}",
                resolution.queue,
                resolution.accelerator.as_deref().unwrap_or("none (CPU-only)")
            ),
        );

        self.begin(stage, Stage::Quota);
        let reconciler = QuotaReconciler::new(
            kubectl.clone(),
            &self.settings.namespace,
            self.settings.quota.clone(),
        );
        let (quota, quota_warning) = reconciler.reconcile(&resolution.queue).await;
        if let Some(warning) = quota_warning {
            self.warn(Stage::Quota, warning);
        }
        self.events.emit(PipelineEvent::QuotaReconciled {
            outcome: quota.clone(),
        });
        self.complete(Stage::Quota, quota.to_string());

        self.begin(stage, Stage::Prerequisites);
        let prerequisites = PrerequisiteManager::new(
            kubectl.clone(),
            self.fetcher.clone(),
            self.settings.controller.clone(),
        )
        .with_events(self.events.clone());
        let controller = prerequisites.ensure_ready().await?;
        self.complete(Stage::Prerequisites, format!("controller was {}", controller));

        self.begin(stage, Stage::Image);
        let assembler = ImageAssembler::new(self.registry.clone(), &self.settings.registry);
        let image = assembler.assemble(&image_source, &context.project_id).await?;
        self.complete(Stage::Image, image.clone());

        self.begin(stage, Stage::Manifest);
        let document = manifest::render(&ManifestInput {
            workload_name: request.workload_name.clone(),
            queue: resolution.queue.clone(),
            image: image.clone(),
            command: request.command.clone(),
            accelerator: resolution.accelerator.clone(),
            scaling: request.scaling.clone(),
        })?;
        let applier = ManifestApplier::new(kubectl, &self.settings.namespace);
        let destination = applier
            .deliver(&document, request.output_manifest.as_deref())
            .await?;
        self.complete(Stage::Manifest, document.workload_name.clone());

        Ok(SubmissionReport {
            run_id,
            project_id: context.project_id,
            workload_name: document.workload_name,
            queue: resolution.queue,
            accelerator: resolution.accelerator.unwrap_or_default(),
            image,
            controller,
            quota,
            destination,
            started_at,
            completed_at: Utc::now(),
        })
    }
}

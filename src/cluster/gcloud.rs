//! Project resolution and cluster credentials through `gcloud`

use crate::core::{ClusterContext, ClusterTarget, PipelineError};
use crate::shell::{CommandRunner, Invocation};
use std::sync::Arc;
use tracing::info;

pub struct Gcloud {
    runner: Arc<dyn CommandRunner>,
}

impl Gcloud {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Explicit project, or the one configured in the gcloud CLI
    pub async fn resolve_project(&self, explicit: Option<&str>) -> Result<String, PipelineError> {
        if let Some(project) = explicit.map(str::trim).filter(|p| !p.is_empty()) {
            info!(project, "Using provided project");
            return Ok(project.to_string());
        }

        let invocation = Invocation::new("gcloud", ["config", "get-value", "project"]);
        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|e| PipelineError::command("resolving project", e))?;
        if !output.success() {
            return Err(PipelineError::ClusterAccess(format!(
                "failed to read project from gcloud config: {}",
                output.diagnostics()
            )));
        }

        let project = output.stdout.trim();
        if project.is_empty() || project == "(unset)" {
            return Err(PipelineError::ClusterAccess(
                "no project configured; pass --project or run `gcloud config set project`"
                    .to_string(),
            ));
        }
        info!(project, "Using project from gcloud config");
        Ok(project.to_string())
    }

    /// Resolve the full cluster context for a target
    pub async fn resolve_context(
        &self,
        target: &ClusterTarget,
    ) -> Result<ClusterContext, PipelineError> {
        let project = self.resolve_project(target.project.as_deref()).await?;
        Ok(ClusterContext::new(
            project,
            target.name.trim(),
            target.location.trim(),
        ))
    }

    /// Point kubectl at the cluster
    pub async fn get_credentials(&self, context: &ClusterContext) -> Result<(), PipelineError> {
        let invocation = Invocation::new(
            "gcloud",
            [
                "container",
                "clusters",
                "get-credentials",
                context.cluster_name.as_str(),
                "--zone",
                context.location.as_str(),
                "--project",
                context.project_id.as_str(),
            ],
        );
        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|e| PipelineError::command("fetching cluster credentials", e))?;
        if !output.success() {
            return Err(PipelineError::ClusterAccess(format!(
                "failed to get credentials for {}: {}",
                context.describe(),
                output.diagnostics()
            )));
        }
        info!(cluster = %context.describe(), "kubectl configured");
        Ok(())
    }
}

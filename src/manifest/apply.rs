//! Manifest delivery: apply with replace semantics, or write to a file

use super::jobset::ManifestDocument;
use crate::cluster::Kubectl;
use crate::core::{ManifestDestination, PipelineError};
use std::path::Path;
use tracing::{debug, info};

pub struct ManifestApplier {
    kubectl: Kubectl,
    namespace: String,
}

impl ManifestApplier {
    pub fn new(kubectl: Kubectl, namespace: impl Into<String>) -> Self {
        Self {
            kubectl,
            namespace: namespace.into(),
        }
    }

    /// Apply, or write to `output` when given. Writing never touches the cluster.
    pub async fn deliver(
        &self,
        document: &ManifestDocument,
        output: Option<&Path>,
    ) -> Result<ManifestDestination, PipelineError> {
        match output {
            Some(path) => {
                write_manifest(document, path).await?;
                Ok(ManifestDestination::Written(path.to_path_buf()))
            }
            None => {
                self.apply(document).await?;
                Ok(ManifestDestination::Applied)
            }
        }
    }

    /// Replace any JobSet with the same name, then create it afresh
    pub async fn apply(&self, document: &ManifestDocument) -> Result<(), PipelineError> {
        let delete = self.kubectl.invocation(&[
            "delete",
            "jobsets.jobset.x-k8s.io",
            document.workload_name.as_str(),
            "-n",
            self.namespace.as_str(),
            "--ignore-not-found",
        ]);
        let output = self
            .kubectl
            .run(delete)
            .await
            .map_err(|e| PipelineError::command("deleting previous JobSet", e))?;
        if !output.success() && !output.is_not_found() {
            return Err(PipelineError::ManifestApply(format!(
                "failed to delete existing JobSet {}: {}",
                document.workload_name,
                output.diagnostics()
            )));
        }

        debug!(manifest = %document.yaml, "Applying JobSet manifest");
        let apply = self
            .kubectl
            .invocation(&["apply", "-n", self.namespace.as_str(), "-f", "-"])
            .with_stdin(document.yaml.clone());
        let output = self
            .kubectl
            .run(apply)
            .await
            .map_err(|e| PipelineError::command("applying JobSet", e))?;
        if !output.success() {
            return Err(PipelineError::ManifestApply(format!(
                "kubectl apply failed with exit code {}: {}",
                output.exit_code,
                output.diagnostics()
            )));
        }

        info!(
            workload = %document.workload_name,
            queue = %document.queue,
            "JobSet submitted"
        );
        Ok(())
    }
}

async fn write_manifest(document: &ManifestDocument, path: &Path) -> Result<(), PipelineError> {
    tokio::fs::write(path, &document.yaml).await.map_err(|e| {
        PipelineError::ManifestApply(format!(
            "failed to write manifest to {}: {}",
            path.display(),
            e
        ))
    })?;
    info!(path = %path.display(), workload = %document.workload_name, "Manifest written");
    Ok(())
}

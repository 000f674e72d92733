//! ClusterQueue quota reconciliation
//!
//! Makes sure the ClusterQueue behind a LocalQueue covers `cpu` and
//! `memory`, so Kueue can admit workloads that request them. Appends only
//! what is missing; a queue that already covers both is left alone.

use super::kubectl::Kubectl;
use super::types::{ClusterQueue, JsonPatchOp, LocalQueue};
use crate::core::{PipelineWarning, QuotaOutcome, QuotaSettings};
use serde_json::json;
use tracing::{info, warn};

const REQUIRED_RESOURCES: [&str; 2] = ["cpu", "memory"];

/// A LocalQueue and the ClusterQueue it feeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub local_queue: String,
    pub cluster_queue: String,
}

pub struct QuotaReconciler {
    kubectl: Kubectl,
    namespace: String,
    ceilings: QuotaSettings,
}

impl QuotaReconciler {
    pub fn new(kubectl: Kubectl, namespace: impl Into<String>, ceilings: QuotaSettings) -> Self {
        Self {
            kubectl,
            namespace: namespace.into(),
            ceilings,
        }
    }

    /// Reconcile the ClusterQueue behind `queue`. Never fails the run.
    pub async fn reconcile(&self, queue: &str) -> (QuotaOutcome, Option<PipelineWarning>) {
        match self.try_reconcile(queue).await {
            Ok(outcome) => (outcome, None),
            Err(reason) => {
                warn!(queue, %reason, "Quota reconciliation skipped; workload may stay pending");
                (
                    QuotaOutcome::Skipped {
                        reason: reason.clone(),
                    },
                    Some(PipelineWarning::QuotaPatch(reason)),
                )
            }
        }
    }

    /// Look up which ClusterQueue a LocalQueue is bound to
    pub async fn binding(&self, queue: &str) -> Result<QueueBinding, String> {
        let local: LocalQueue = self
            .kubectl
            .get_json(&[
                "get",
                "localqueues.kueue.x-k8s.io",
                queue,
                "-n",
                self.namespace.as_str(),
                "-o",
                "json",
            ])
            .await
            .map_err(|e| format!("failed to read LocalQueue '{}': {}", queue, e))?;

        let cluster_queue = local
            .spec
            .cluster_queue
            .filter(|cq| !cq.trim().is_empty())
            .ok_or_else(|| format!("LocalQueue '{}' is not bound to a ClusterQueue", queue))?;

        Ok(QueueBinding {
            local_queue: queue.to_string(),
            cluster_queue,
        })
    }

    async fn try_reconcile(&self, queue: &str) -> Result<QuotaOutcome, String> {
        let binding = self.binding(queue).await?;
        let cq_name = binding.cluster_queue.as_str();

        let cluster_queue: ClusterQueue = self
            .kubectl
            .get_json(&["get", "clusterqueues.kueue.x-k8s.io", cq_name, "-o", "json"])
            .await
            .map_err(|e| format!("failed to read ClusterQueue '{}': {}", cq_name, e))?;

        let ops = self.missing_coverage_patch(&cluster_queue)?;
        if ops.is_empty() {
            info!(cluster_queue = cq_name, "ClusterQueue already covers cpu and memory");
            return Ok(QuotaOutcome::AlreadyCovered);
        }

        let added: Vec<String> = ops
            .iter()
            .filter(|op| op.path.ends_with("coveredResources/-"))
            .filter_map(|op| op.value.as_str().map(str::to_string))
            .collect();

        let patch = serde_json::to_string(&ops)
            .map_err(|e| format!("failed to encode quota patch: {}", e))?;
        self.kubectl
            .run_checked(self.kubectl.invocation(&[
                "patch",
                "clusterqueues.kueue.x-k8s.io",
                cq_name,
                "--type=json",
                "-p",
                patch.as_str(),
            ]))
            .await
            .map_err(|e| format!("failed to patch ClusterQueue '{}': {}", cq_name, e))?;

        info!(cluster_queue = cq_name, added = ?added, "Extended ClusterQueue quota");
        Ok(QuotaOutcome::Extended { added })
    }

    /// JSON-patch operations appending every uncovered required resource.
    /// Empty when nothing is missing.
    pub fn missing_coverage_patch(&self, cq: &ClusterQueue) -> Result<Vec<JsonPatchOp>, String> {
        let name = &cq.metadata.name;
        let group = cq
            .spec
            .resource_groups
            .first()
            .ok_or_else(|| format!("ClusterQueue '{}' has no resource groups", name))?;

        let missing: Vec<&str> = REQUIRED_RESOURCES
            .iter()
            .copied()
            .filter(|r| !group.covered_resources.iter().any(|c| c == r))
            .collect();
        if missing.is_empty() {
            return Ok(Vec::new());
        }

        if group.flavors.is_empty() {
            return Err(format!(
                "ClusterQueue '{}' has no flavors in its first resource group",
                name
            ));
        }

        let mut ops = Vec::new();
        for resource in missing {
            let ceiling = match resource {
                "cpu" => &self.ceilings.cpu,
                _ => &self.ceilings.memory,
            };
            ops.push(JsonPatchOp::add(
                "/spec/resourceGroups/0/coveredResources/-",
                json!(resource),
            ));
            ops.push(JsonPatchOp::add(
                "/spec/resourceGroups/0/flavors/0/resources/-",
                json!({ "name": resource, "nominalQuota": ceiling }),
            ));
        }
        Ok(ops)
    }
}

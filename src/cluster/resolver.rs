//! Queue and accelerator discovery
//!
//! Fills in whatever the request left unset from live cluster state. Nothing
//! here is fatal: a failed or ambiguous lookup becomes a warning and a
//! fallback value.

use super::kubectl::Kubectl;
use super::types::{ClusterNode, List, LocalQueue, ResourceFlavor};
use crate::core::{
    PipelineWarning, WorkloadRequest, GKE_ACCELERATOR_LABEL, GKE_TPU_ACCELERATOR_LABEL,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const ACCELERATOR_LABELS: [&str; 2] = [GKE_ACCELERATOR_LABEL, GKE_TPU_ACCELERATOR_LABEL];

/// Queue and accelerator to use for the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub queue: String,
    /// `None` means CPU-only
    pub accelerator: Option<String>,
    pub warnings: Vec<PipelineWarning>,
}

pub struct ResourceResolver {
    kubectl: Kubectl,
    namespace: String,
    default_queue: String,
}

impl ResourceResolver {
    pub fn new(
        kubectl: Kubectl,
        namespace: impl Into<String>,
        default_queue: impl Into<String>,
    ) -> Self {
        Self {
            kubectl,
            namespace: namespace.into(),
            default_queue: default_queue.into(),
        }
    }

    pub async fn resolve(&self, request: &WorkloadRequest) -> Resolution {
        let mut warnings = Vec::new();

        let queue = match request.requested_queue() {
            Some(queue) => queue.to_string(),
            None => self.discover_queue(&mut warnings).await,
        };

        let accelerator = match request.requested_accelerator() {
            Some(accelerator) => Some(accelerator.to_string()),
            None => self.discover_accelerator(&mut warnings).await,
        };

        info!(
            queue = %queue,
            accelerator = accelerator.as_deref().unwrap_or("none"),
            "Resolved workload resources"
        );
        Resolution {
            queue,
            accelerator,
            warnings,
        }
    }

    async fn discover_queue(&self, warnings: &mut Vec<PipelineWarning>) -> String {
        let queues: Result<List<LocalQueue>, _> = self
            .kubectl
            .get_json(&[
                "get",
                "localqueues.kueue.x-k8s.io",
                "-n",
                self.namespace.as_str(),
                "-o",
                "json",
            ])
            .await;

        let names: Vec<String> = match queues {
            Ok(list) => list
                .items
                .into_iter()
                .map(|q| q.metadata.name)
                .filter(|name| !name.is_empty())
                .collect(),
            Err(e) => {
                push_warning(
                    warnings,
                    format!(
                        "could not list LocalQueues in '{}' ({}); using '{}'",
                        self.namespace, e, self.default_queue
                    ),
                );
                return self.default_queue.clone();
            }
        };

        pick_first(names, "LocalQueue", warnings).unwrap_or_else(|| {
            debug!(queue = %self.default_queue, "No LocalQueues found, using default");
            self.default_queue.clone()
        })
    }

    async fn discover_accelerator(&self, warnings: &mut Vec<PipelineWarning>) -> Option<String> {
        let from_flavors: Result<List<ResourceFlavor>, _> = self
            .kubectl
            .get_json(&["get", "resourceflavors.kueue.x-k8s.io", "-o", "json"])
            .await;

        let mut found = match from_flavors {
            Ok(list) => accelerator_labels(list.items.iter().map(|f| &f.spec.node_labels)),
            Err(e) => {
                debug!(error = %e, "ResourceFlavor lookup failed, falling back to nodes");
                Vec::new()
            }
        };

        if found.is_empty() {
            let nodes: Result<List<ClusterNode>, _> =
                self.kubectl.get_json(&["get", "nodes", "-o", "json"]).await;
            match nodes {
                Ok(list) => {
                    found = accelerator_labels(list.items.iter().map(|n| &n.metadata.labels));
                }
                Err(e) => {
                    push_warning(
                        warnings,
                        format!("could not discover accelerators ({}); running CPU-only", e),
                    );
                    return None;
                }
            }
        }

        pick_first(found, "accelerator type", warnings)
    }
}

/// Accelerator identifiers from label maps, de-duplicated in discovery order
fn accelerator_labels<'a, I>(label_maps: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a BTreeMap<String, String>>,
{
    let mut found: Vec<String> = Vec::new();
    for labels in label_maps {
        for key in ACCELERATOR_LABELS {
            if let Some(value) = labels.get(key).map(|v| v.trim()) {
                if !value.is_empty() && !found.iter().any(|f| f == value) {
                    found.push(value.to_string());
                }
            }
        }
    }
    found
}

/// First candidate, warning when there was more than one
fn pick_first(
    mut candidates: Vec<String>,
    what: &str,
    warnings: &mut Vec<PipelineWarning>,
) -> Option<String> {
    if candidates.len() > 1 {
        push_warning(
            warnings,
            format!(
                "found {} candidates for {} ({}); using '{}'",
                candidates.len(),
                what,
                candidates.join(", "),
                candidates[0]
            ),
        );
    }
    if candidates.is_empty() {
        None
    } else {
        Some(candidates.swap_remove(0))
    }
}

fn push_warning(warnings: &mut Vec<PipelineWarning>, message: String) {
    warn!("{}", message);
    warnings.push(PipelineWarning::Resolution(message));
}

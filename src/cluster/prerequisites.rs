//! JobSet controller installation and readiness
//!
//! A cluster is either missing the JobSet CRD, has it but no serving
//! admission webhook, or is ready. The first two states both lead to a full
//! (re)install from the release manifests followed by a readiness wait; a
//! ready cluster is left untouched.
//!
//! The CRD existing is not enough: until the webhook service has a live
//! endpoint, the API server rejects JobSet creates. Readiness is therefore
//! judged by the webhook endpoints, not by the deployment alone.

use super::fetch::ManifestFetcher;
use super::kubectl::{Kubectl, KubectlError};
use super::types::Endpoints;
use crate::core::{
    emit_documents, parse_documents, ControllerSettings, ControllerState, Node, PipelineError,
    GKE_ACCELERATOR_LABEL, GOOGLE_TPU_RESOURCE, NVIDIA_GPU_RESOURCE,
};
use crate::execution::{EventSink, PipelineEvent, RetryError};
use std::sync::Arc;
use tracing::{debug, info};

/// Label stamped on the controller's pod template
pub const MANAGED_BY_LABEL: (&str, &str) = ("app.kubernetes.io/managed-by", "workload-submit");

/// Taint keys the controller must tolerate to schedule on accelerator nodes
pub const TOLERATED_TAINTS: [&str; 3] =
    [NVIDIA_GPU_RESOURCE, GOOGLE_TPU_RESOURCE, GKE_ACCELERATOR_LABEL];

pub struct PrerequisiteManager {
    kubectl: Kubectl,
    fetcher: Arc<dyn ManifestFetcher>,
    settings: ControllerSettings,
    events: EventSink,
}

impl PrerequisiteManager {
    pub fn new(
        kubectl: Kubectl,
        fetcher: Arc<dyn ManifestFetcher>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            kubectl,
            fetcher,
            settings,
            events: EventSink::new(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Make sure the controller is installed and serving.
    ///
    /// Returns the state observed before any action was taken.
    pub async fn ensure_ready(&self) -> Result<ControllerState, PipelineError> {
        let observed = self.observe().await?;
        self.events
            .emit(PipelineEvent::ControllerObserved { state: observed });

        match observed {
            ControllerState::Ready => {
                info!("JobSet controller already ready");
            }
            ControllerState::Uninstalled | ControllerState::InstalledUnhealthy => {
                info!(state = %observed, "Installing JobSet controller");
                self.install().await?;
                self.wait_ready().await?;
                info!("JobSet controller ready");
            }
        }
        Ok(observed)
    }

    /// Current controller state
    pub async fn observe(&self) -> Result<ControllerState, PipelineError> {
        let invocation = self
            .kubectl
            .invocation(&["get", "crd", self.settings.crd_name.as_str()]);
        let output = self
            .kubectl
            .run(invocation)
            .await
            .map_err(|e| PipelineError::command("checking JobSet CRD", e))?;

        if !output.success() {
            if output.is_not_found() {
                debug!(crd = %self.settings.crd_name, "JobSet CRD not found");
                return Ok(ControllerState::Uninstalled);
            }
            return Err(PipelineError::PrerequisiteInstall(format!(
                "failed to check for CRD {}: {}",
                self.settings.crd_name,
                output.diagnostics()
            )));
        }

        match self.webhook_ready().await {
            Ok(true) => Ok(ControllerState::Ready),
            Ok(false) => Ok(ControllerState::InstalledUnhealthy),
            Err(e) => {
                debug!(error = %e, "Webhook endpoint lookup failed");
                Ok(ControllerState::InstalledUnhealthy)
            }
        }
    }

    async fn webhook_ready(&self) -> Result<bool, KubectlError> {
        let endpoints: Result<Endpoints, KubectlError> = self
            .kubectl
            .get_json(&[
                "get",
                "endpoints",
                self.settings.webhook_service.as_str(),
                "-n",
                self.settings.namespace.as_str(),
                "-o",
                "json",
            ])
            .await;
        match endpoints {
            Ok(endpoints) => Ok(endpoints.has_ready_address()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn install(&self) -> Result<(), PipelineError> {
        let raw = self
            .fetcher
            .fetch(&self.settings.manifest_url)
            .await
            .map_err(|e| PipelineError::PrerequisiteInstall(e.to_string()))?;

        let (manifests, documents) = prepare_manifests(&raw)?;
        self.events
            .emit(PipelineEvent::ControllerInstalling { documents });

        // Old pods may hold stale webhook certificates
        let delete = self.kubectl.invocation(&[
            "delete",
            "deployment",
            self.settings.deployment.as_str(),
            "-n",
            self.settings.namespace.as_str(),
            "--ignore-not-found",
            "--grace-period=0",
            "--force",
        ]);
        let output = self
            .kubectl
            .run(delete)
            .await
            .map_err(|e| PipelineError::command("deleting controller deployment", e))?;
        if !output.success() && !output.is_not_found() {
            return Err(PipelineError::PrerequisiteInstall(format!(
                "failed to delete deployment {}: {}",
                self.settings.deployment,
                output.diagnostics()
            )));
        }

        let apply = self
            .kubectl
            .invocation(&["apply", "--server-side", "--force-conflicts", "-f", "-"])
            .with_stdin(manifests);
        self.kubectl
            .run_checked(apply)
            .await
            .map_err(|e| PipelineError::PrerequisiteInstall(e.to_string()))?;
        info!(documents, "Applied JobSet controller manifests");
        Ok(())
    }

    async fn wait_ready(&self) -> Result<(), PipelineError> {
        let target = format!("deployment/{}", self.settings.deployment);
        let timeout = format!("--timeout={}s", self.settings.rollout_timeout_secs);
        let rollout = self.kubectl.invocation(&[
            "rollout",
            "status",
            target.as_str(),
            "-n",
            self.settings.namespace.as_str(),
            timeout.as_str(),
        ]);
        self.kubectl
            .run_checked(rollout)
            .await
            .map_err(|e| PipelineError::PrerequisiteInstall(e.to_string()))?;
        debug!(deployment = %self.settings.deployment, "Controller rollout complete");

        let policy = self.settings.readiness_policy();
        let max_attempts = policy.max_attempts;
        let resource = format!("endpoints/{}", self.settings.webhook_service);
        let this = self;

        let polled = policy
            .run_observed(
                "webhook readiness",
                None,
                |attempt, _: &String| {
                    this.events.emit(PipelineEvent::ReadinessPoll {
                        attempt,
                        max_attempts,
                    })
                },
                move || async move {
                    match this.webhook_ready().await {
                        Ok(true) => Ok(()),
                        Ok(false) => Err("no ready endpoints".to_string()),
                        Err(e) => Err(e.to_string()),
                    }
                },
            )
            .await;

        polled.map_err(|e: RetryError<String>| PipelineError::ReadinessTimeout {
            resource,
            attempts: e.attempts(),
        })
    }
}

/// Clean and adapt the controller manifests for apply.
///
/// Drops every `description` field (the CRD schemas otherwise exceed the
/// annotation size limit), lets the controller tolerate accelerator taints,
/// and labels its pods. Returns the YAML stream and its document count.
pub fn prepare_manifests(raw: &str) -> Result<(String, usize), PipelineError> {
    let mut documents = parse_documents(raw)
        .map_err(|e| PipelineError::PrerequisiteInstall(e.to_string()))?;
    if documents.is_empty() {
        return Err(PipelineError::PrerequisiteInstall(
            "controller manifest set is empty".to_string(),
        ));
    }

    for doc in documents.iter_mut() {
        doc.remove_key_recursive("description");
        if doc.kind() == Some("Deployment") {
            doc.for_each_pod_spec_mut(&mut add_tolerations);
            label_pod_template(doc);
        }
    }

    let yaml = emit_documents(&documents)
        .map_err(|e| PipelineError::PrerequisiteInstall(e.to_string()))?;
    Ok((yaml, documents.len()))
}

fn toleration(key: &str) -> Node {
    let mut t = Node::mapping();
    if let Some(map) = t.as_mapping_mut() {
        map.insert("key".to_string(), Node::string(key));
        map.insert("operator".to_string(), Node::string("Exists"));
        map.insert("effect".to_string(), Node::string("NoSchedule"));
    }
    t
}

fn add_tolerations(pod_spec: &mut Node) {
    let Some(tolerations) = pod_spec.entry_sequence("tolerations") else {
        return;
    };
    for key in TOLERATED_TAINTS {
        let present = tolerations.iter().any(|t| {
            t.get("key").and_then(Node::as_str) == Some(key)
                && t.get("effect").and_then(Node::as_str) == Some("NoSchedule")
        });
        if !present {
            tolerations.push(toleration(key));
        }
    }
}

fn label_pod_template(deployment: &mut Node) {
    let labels = deployment
        .entry_mapping("spec")
        .and_then(|n| n.entry_mapping("template"))
        .and_then(|n| n.entry_mapping("metadata"))
        .and_then(|n| n.entry_mapping("labels"))
        .and_then(Node::as_mapping_mut);
    if let Some(labels) = labels {
        labels.insert(
            MANAGED_BY_LABEL.0.to_string(),
            Node::string(MANAGED_BY_LABEL.1),
        );
    }
}

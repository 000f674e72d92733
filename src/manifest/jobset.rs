//! JobSet manifest rendering
//!
//! The manifest is built from typed structs and serialized with serde_yaml,
//! so user-supplied strings (the command in particular) are always quoted
//! and escaped correctly.

use crate::core::naming::generate_workload_name;
use crate::core::{AcceleratorProfile, PipelineError, ScalingShape};
use serde::Serialize;
use std::collections::BTreeMap;

pub const JOBSET_API_VERSION: &str = "jobset.x-k8s.io/v1alpha2";
pub const WORKLOAD_LABEL: &str = "workload-submit/workload";
pub const QUEUE_LABEL: &str = "kueue.x-k8s.io/queue-name";
pub const REPLICATED_JOB_NAME: &str = "main-job";
pub const CONTAINER_NAME: &str = "workload-container";
pub const SCRATCH_VOLUME: &str = "temp-storage";
pub const SCRATCH_MOUNT_PATH: &str = "/mnt/data";

pub const DEFAULT_SLICES: u32 = 1;
pub const DEFAULT_REPLICAS_PER_SLICE: u32 = 1;
pub const DEFAULT_MAX_RESTARTS: u32 = 1;
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Everything that goes into one rendered manifest
#[derive(Debug, Clone)]
pub struct ManifestInput {
    /// Generated when `None`
    pub workload_name: Option<String>,
    pub queue: String,
    pub image: String,
    pub command: String,
    /// `None` renders a CPU-only workload with no node selector
    pub accelerator: Option<String>,
    pub scaling: ScalingShape,
}

/// A rendered JobSet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    pub workload_name: String,
    pub queue: String,
    pub yaml: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Quantity {
    Count(u32),
    Text(&'static str),
}

#[derive(Debug, Serialize)]
struct ObjectMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    labels: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobSet {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    spec: JobSetSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobSetSpec {
    ttl_seconds_after_finished: u64,
    failure_policy: FailurePolicy,
    replicated_jobs: Vec<ReplicatedJob>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailurePolicy {
    max_restarts: u32,
}

#[derive(Debug, Serialize)]
struct ReplicatedJob {
    name: &'static str,
    replicas: u32,
    template: JobTemplate,
}

#[derive(Debug, Serialize)]
struct JobTemplate {
    spec: JobSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobSpec {
    parallelism: u32,
    completions: u32,
    backoff_limit: u32,
    template: PodTemplate,
}

#[derive(Debug, Serialize)]
struct PodTemplate {
    metadata: ObjectMeta,
    spec: PodSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PodSpec {
    restart_policy: &'static str,
    containers: Vec<Container>,
    volumes: Vec<Volume>,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_selector: Option<BTreeMap<&'static str, String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Container {
    name: &'static str,
    image: String,
    command: Vec<String>,
    resources: Resources,
    volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Serialize)]
struct Resources {
    limits: BTreeMap<&'static str, Quantity>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VolumeMount {
    name: &'static str,
    mount_path: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    name: &'static str,
    empty_dir: BTreeMap<String, String>,
}

/// Render the JobSet for `input`
pub fn render(input: &ManifestInput) -> Result<ManifestDocument, PipelineError> {
    let workload_name = input
        .workload_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_workload_name);

    let accelerator = input
        .accelerator
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty());
    let profile = AcceleratorProfile::for_accelerator(accelerator.unwrap_or(""));

    let mut limits = BTreeMap::new();
    limits.insert("cpu", Quantity::Text(profile.cpu));
    limits.insert("memory", Quantity::Text(profile.memory));
    if let Some(device) = profile.device.filter(|d| d.count > 0) {
        limits.insert(device.resource, Quantity::Count(device.count));
    }

    let node_selector = accelerator.map(|a| {
        let mut selector = BTreeMap::new();
        selector.insert(profile.selector_key, a.to_string());
        selector
    });

    let replicas_per_slice = input
        .scaling
        .replicas_per_slice
        .unwrap_or(DEFAULT_REPLICAS_PER_SLICE);

    let jobset = JobSet {
        api_version: JOBSET_API_VERSION,
        kind: "JobSet",
        metadata: ObjectMeta {
            name: Some(workload_name.clone()),
            labels: BTreeMap::from([
                (WORKLOAD_LABEL, workload_name.clone()),
                (QUEUE_LABEL, input.queue.clone()),
            ]),
        },
        spec: JobSetSpec {
            ttl_seconds_after_finished: input
                .scaling
                .ttl_seconds_after_finished
                .unwrap_or(DEFAULT_TTL_SECONDS),
            failure_policy: FailurePolicy {
                max_restarts: input.scaling.max_restarts.unwrap_or(DEFAULT_MAX_RESTARTS),
            },
            replicated_jobs: vec![ReplicatedJob {
                name: REPLICATED_JOB_NAME,
                replicas: input.scaling.slices.unwrap_or(DEFAULT_SLICES),
                template: JobTemplate {
                    spec: JobSpec {
                        parallelism: replicas_per_slice,
                        completions: replicas_per_slice,
                        backoff_limit: 0,
                        template: PodTemplate {
                            metadata: ObjectMeta {
                                name: None,
                                labels: BTreeMap::from([(WORKLOAD_LABEL, workload_name.clone())]),
                            },
                            spec: PodSpec {
                                restart_policy: "Never",
                                containers: vec![Container {
                                    name: CONTAINER_NAME,
                                    image: input.image.clone(),
                                    command: vec![
                                        "/bin/bash".to_string(),
                                        "-c".to_string(),
                                        input.command.clone(),
                                    ],
                                    resources: Resources { limits },
                                    volume_mounts: vec![VolumeMount {
                                        name: SCRATCH_VOLUME,
                                        mount_path: SCRATCH_MOUNT_PATH,
                                    }],
                                }],
                                volumes: vec![Volume {
                                    name: SCRATCH_VOLUME,
                                    empty_dir: BTreeMap::new(),
                                }],
                                node_selector,
                            },
                        },
                    },
                },
            }],
        },
    };

    let yaml = serde_yaml::to_string(&jobset)
        .map_err(|e| PipelineError::ManifestApply(format!("failed to render manifest: {}", e)))?;

    Ok(ManifestDocument {
        workload_name,
        queue: input.queue.clone(),
        yaml,
    })
}

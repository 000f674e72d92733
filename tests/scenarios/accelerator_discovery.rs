//! Test: queue and accelerator discovery from live cluster state

use crate::helpers::*;
use workload_submit::core::{Node, Number, PipelineWarning, GKE_ACCELERATOR_LABEL, GKE_TPU_ACCELERATOR_LABEL};
use workload_submit::manifest::jobset::QUEUE_LABEL;
use workload_submit::{PipelineEvent, Stage};

fn resolution_warnings(events: &[PipelineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Warning {
                stage: Stage::Resolve,
                warning: PipelineWarning::Resolution(msg),
            } => Some(msg.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_a100_discovered_from_flavors() {
    let cluster = FakeCluster::ready()
        .with_local_queue("batch-queue", "cluster-queue")
        .with_flavor_label(GKE_ACCELERATOR_LABEL, "nvidia-tesla-a100");
    let harness = Harness::new(cluster);
    let mut request = prebuilt_request("gcr.io/p/trainer:v1");
    request.workload_name = Some("gpu-job".to_string());

    let report = harness.pipeline.submit_job(&request).await.unwrap();

    assert_eq!(report.queue, "batch-queue");
    assert_eq!(report.accelerator, "nvidia-tesla-a100");
    assert_eq!(report.image, "gcr.io/p/trainer:v1");
    assert!(resolution_warnings(&harness.events()).is_empty());
    // Flavors answered, so nodes were never listed
    assert_eq!(harness.cluster.count_calls("kubectl get nodes"), 0);

    let root = live_jobset(&harness.cluster, "gpu-job");
    assert_eq!(
        root.get_path(&["metadata", "labels", QUEUE_LABEL])
            .and_then(Node::as_str),
        Some("batch-queue")
    );
    assert_eq!(
        limits(&root).get("nvidia.com/gpu"),
        Some(&Node::Number(Number::Int(1)))
    );
    assert_eq!(
        pod_spec(&root)
            .get_path(&["nodeSelector", GKE_ACCELERATOR_LABEL])
            .and_then(Node::as_str),
        Some("nvidia-tesla-a100")
    );
}

#[tokio::test]
async fn test_node_labels_used_when_no_flavors() {
    let cluster = FakeCluster::ready()
        .with_local_queue("tpu-queue", "tpu-cq")
        .with_node_label(GKE_TPU_ACCELERATOR_LABEL, "tpu-v5-lite-podslice");
    let harness = Harness::new(cluster);
    let mut request = prebuilt_request("gcr.io/p/trainer:v1");
    request.workload_name = Some("tpu-job".to_string());

    let report = harness.pipeline.submit_job(&request).await.unwrap();

    assert_eq!(report.accelerator, "tpu-v5-lite-podslice");
    let root = live_jobset(&harness.cluster, "tpu-job");
    assert_eq!(
        limits(&root).get("google.com/tpu"),
        Some(&Node::Number(Number::Int(4)))
    );
    assert_eq!(
        pod_spec(&root)
            .get_path(&["nodeSelector", GKE_TPU_ACCELERATOR_LABEL])
            .and_then(Node::as_str),
        Some("tpu-v5-lite-podslice")
    );
}

#[tokio::test]
async fn test_ambiguous_discovery_picks_first_and_warns() {
    let cluster = FakeCluster::ready()
        .with_local_queue("first-queue", "cq-a")
        .with_local_queue("second-queue", "cq-b")
        .with_flavor_label(GKE_ACCELERATOR_LABEL, "nvidia-l4")
        .with_flavor_label(GKE_ACCELERATOR_LABEL, "nvidia-tesla-t4");
    let harness = Harness::new(cluster);

    let report = harness
        .pipeline
        .submit_job(&prebuilt_request("gcr.io/p/trainer:v1"))
        .await
        .unwrap();

    assert_eq!(report.queue, "first-queue");
    assert_eq!(report.accelerator, "nvidia-l4");
    assert_eq!(resolution_warnings(&harness.events()).len(), 2);
}

#[tokio::test]
async fn test_explicit_values_skip_discovery() {
    let harness = Harness::new(FakeCluster::ready());
    let mut request = prebuilt_request("gcr.io/p/trainer:v1");
    request.queue = Some("my-queue".to_string());
    request.accelerator = Some("nvidia-h100-80gb".to_string());

    let report = harness.pipeline.submit_job(&request).await.unwrap();

    assert_eq!(report.queue, "my-queue");
    assert_eq!(report.accelerator, "nvidia-h100-80gb");
    assert_eq!(harness.cluster.count_calls("kubectl get resourceflavors"), 0);
    assert_eq!(harness.cluster.count_calls("kubectl get nodes"), 0);
    assert_eq!(
        harness
            .cluster
            .count_calls("kubectl get localqueues.kueue.x-k8s.io -n"),
        0
    );
}

#[tokio::test]
async fn test_unknown_accelerator_gets_cpu_profile() {
    let harness = Harness::new(FakeCluster::ready());
    let mut request = prebuilt_request("gcr.io/p/trainer:v1");
    request.accelerator = Some("acme-x1".to_string());
    request.workload_name = Some("odd-job".to_string());

    harness.pipeline.submit_job(&request).await.unwrap();

    let root = live_jobset(&harness.cluster, "odd-job");
    let limits = limits(&root);
    assert_eq!(limits.get("cpu").and_then(Node::as_str), Some("0.5"));
    assert_eq!(limits.get("memory").and_then(Node::as_str), Some("512Mi"));
    assert!(limits.get("nvidia.com/gpu").is_none());
    assert!(limits.get("google.com/tpu").is_none());
}

#[tokio::test]
async fn test_vendor_substring_selects_generic_gpu() {
    let harness = Harness::new(FakeCluster::ready());
    let mut request = prebuilt_request("gcr.io/p/trainer:v1");
    request.accelerator = Some("nvidia-future-b900".to_string());
    request.workload_name = Some("new-gpu".to_string());

    harness.pipeline.submit_job(&request).await.unwrap();

    let root = live_jobset(&harness.cluster, "new-gpu");
    assert_eq!(
        limits(&root).get("nvidia.com/gpu"),
        Some(&Node::Number(Number::Int(1)))
    );
}

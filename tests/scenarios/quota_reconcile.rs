//! Test: ClusterQueue quota reconciliation is additive and idempotent

use crate::helpers::*;
use workload_submit::core::{PipelineWarning, QuotaOutcome};
use workload_submit::{PipelineEvent, Stage};

#[tokio::test]
async fn test_missing_coverage_patched_once() {
    let cluster = FakeCluster::ready()
        .with_local_queue("team-queue", "team-cq")
        .with_covered(&["nvidia.com/gpu"]);
    let harness = Harness::new(cluster);
    let request = prebuilt_request("gcr.io/p/trainer:v1");

    let first = harness.pipeline.submit_job(&request).await.unwrap();
    assert_eq!(
        first.quota,
        QuotaOutcome::Extended {
            added: vec!["cpu".to_string(), "memory".to_string()]
        }
    );
    assert_eq!(harness.cluster.patch_count(), 1);
    assert_eq!(
        harness.cluster.snapshot().covered,
        vec!["nvidia.com/gpu", "cpu", "memory"]
    );

    let second = harness.pipeline.submit_job(&request).await.unwrap();
    assert_eq!(second.quota, QuotaOutcome::AlreadyCovered);
    assert_eq!(harness.cluster.patch_count(), 1);
    assert_eq!(
        harness
            .cluster
            .count_calls("kubectl patch clusterqueues.kueue.x-k8s.io team-cq"),
        1
    );
}

#[tokio::test]
async fn test_partial_coverage_only_adds_missing() {
    let cluster = FakeCluster::ready()
        .with_local_queue("team-queue", "team-cq")
        .with_covered(&["cpu"]);
    let harness = Harness::new(cluster);

    let report = harness
        .pipeline
        .submit_job(&prebuilt_request("gcr.io/p/trainer:v1"))
        .await
        .unwrap();

    assert_eq!(
        report.quota,
        QuotaOutcome::Extended {
            added: vec!["memory".to_string()]
        }
    );
    let patch = harness
        .cluster
        .calls()
        .into_iter()
        .find(|c| c.starts_with("kubectl patch"))
        .unwrap();
    assert!(patch.contains("10000Gi"));
    assert!(!patch.contains("\"cpu\""));
}

#[tokio::test]
async fn test_unbound_queue_is_a_warning_not_a_failure() {
    let harness = Harness::new(FakeCluster::ready());
    let mut request = prebuilt_request("gcr.io/p/trainer:v1");
    request.queue = Some("ghost-queue".to_string());
    request.workload_name = Some("still-runs".to_string());

    let report = harness.pipeline.submit_job(&request).await.unwrap();

    assert!(matches!(report.quota, QuotaOutcome::Skipped { .. }));
    assert_eq!(harness.cluster.patch_count(), 0);
    assert!(harness.cluster.jobsets().contains_key("still-runs"));
    assert!(harness.events().iter().any(|e| matches!(
        e,
        PipelineEvent::Warning {
            stage: Stage::Quota,
            warning: PipelineWarning::QuotaPatch(_)
        }
    )));
}

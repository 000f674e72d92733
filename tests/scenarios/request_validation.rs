//! Test: malformed requests fail before any external call

use crate::helpers::*;
use workload_submit::core::{ImageSpec, PipelineError};
use workload_submit::{PipelineEvent, Stage};

#[tokio::test]
async fn test_missing_image_source_makes_no_calls() {
    let harness = Harness::new(FakeCluster::ready());
    let mut request = prebuilt_request("unused");
    request.image = ImageSpec::default();

    let err = harness.pipeline.submit_job(&request).await.unwrap_err();

    assert!(err.is_configuration(), "unexpected error: {}", err);
    assert_eq!(harness.cluster.call_count(), 0);
    assert!(harness.registry.pulls.lock().unwrap().is_empty());
    assert_eq!(harness.fetcher.fetches(), 0);
    assert!(harness.events().iter().any(|e| matches!(
        e,
        PipelineEvent::PipelineFailed {
            stage: Stage::Validate,
            ..
        }
    )));
}

#[tokio::test]
async fn test_conflicting_image_sources_rejected() {
    let harness = Harness::new(FakeCluster::ready());
    let mut request = prebuilt_request("gcr.io/p/img:1");
    request.image.base_image = Some("python:3.11".to_string());

    let err = harness.pipeline.submit_job(&request).await.unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(harness.cluster.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_shape_rejected() {
    let harness = Harness::new(FakeCluster::ready());

    let mut zero_slices = prebuilt_request("gcr.io/p/img:1");
    zero_slices.scaling.slices = Some(0);
    assert!(harness
        .pipeline
        .submit_job(&zero_slices)
        .await
        .unwrap_err()
        .is_configuration());

    let mut bad_platform = build_request(std::path::Path::new("."));
    bad_platform.image.platform = "linux".to_string();
    assert!(harness
        .pipeline
        .submit_job(&bad_platform)
        .await
        .unwrap_err()
        .is_configuration());

    assert_eq!(harness.cluster.call_count(), 0);
}

#[tokio::test]
async fn test_unset_gcloud_project_is_cluster_access_error() {
    let harness = Harness::new(FakeCluster::ready().with_gcloud_project("(unset)"));

    let err = harness
        .pipeline
        .submit_job(&prebuilt_request("gcr.io/p/img:1"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::ClusterAccess(_)), "got {}", err);
    assert_eq!(harness.cluster.calls(), vec!["gcloud config get-value project"]);
}

#[tokio::test]
async fn test_explicit_project_skips_gcloud_config() {
    let harness = Harness::new(FakeCluster::ready());
    let mut request = prebuilt_request("gcr.io/p/img:1");
    request.cluster.project = Some("explicit-project".to_string());

    let report = harness.pipeline.submit_job(&request).await.unwrap();

    assert_eq!(report.project_id, "explicit-project");
    assert_eq!(harness.cluster.count_calls("gcloud config"), 0);
    assert_eq!(
        harness.cluster.position(
            "gcloud container clusters get-credentials test-cluster --zone us-central1 --project explicit-project"
        ),
        Some(0)
    );
}

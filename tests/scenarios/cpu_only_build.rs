//! Test: CPU-only workload built from a local context

use crate::helpers::*;
use std::fs;
use workload_submit::core::{ControllerState, ManifestDestination, Node};

fn write_context(dir: &std::path::Path) {
    fs::write(dir.join("main.py"), "print('hello')\n").unwrap();
    fs::write(dir.join("run.log"), "noise\n").unwrap();
    fs::create_dir_all(dir.join("data")).unwrap();
    fs::write(dir.join("data/train.csv"), "a,b\n1,2\n").unwrap();
    fs::create_dir_all(dir.join(".git")).unwrap();
    fs::write(dir.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
    fs::create_dir_all(dir.join("__pycache__")).unwrap();
    fs::write(dir.join("__pycache__/main.cpython-311.pyc"), "x").unwrap();
}

#[tokio::test]
async fn test_cpu_only_build_and_apply() {
    let context = tempfile::tempdir().unwrap();
    write_context(context.path());

    let harness = Harness::new(FakeCluster::ready());
    let mut request = build_request(context.path());
    request.workload_name = Some("cpu-job".to_string());

    let report = harness.pipeline.submit_job(&request).await.unwrap();

    assert_eq!(report.workload_name, "cpu-job");
    assert_eq!(report.queue, "default-queue");
    assert_eq!(report.accelerator, "");
    assert_eq!(report.controller, ControllerState::Ready);
    assert_eq!(report.destination, ManifestDestination::Applied);

    // One layer pushed on top of the pinned base
    let pushes = harness.registry.pushes();
    assert_eq!(pushes.len(), 1);
    let pushed = &pushes[0];
    assert_eq!(pushed.base, "python@sha256:base");
    assert!(
        pushed.destination.starts_with("gcr.io/test-project/"),
        "unexpected destination {}",
        pushed.destination
    );
    assert!(pushed.destination.contains("-runner:"));
    assert_eq!(report.image, pushed.destination);

    // Layer contents follow the ignore rules
    assert!(pushed.files.iter().any(|f| f == "main.py"));
    assert!(pushed.files.iter().any(|f| f == "data/train.csv"));
    assert!(!pushed.files.iter().any(|f| f.ends_with(".log")));
    assert!(!pushed.files.iter().any(|f| f.starts_with(".git")));
    assert!(!pushed.files.iter().any(|f| f.contains("__pycache__")));

    // The applied JobSet is CPU-only
    let root = live_jobset(&harness.cluster, "cpu-job");
    let limits = limits(&root);
    assert_eq!(limits.get("cpu").and_then(Node::as_str), Some("0.5"));
    assert_eq!(limits.get("memory").and_then(Node::as_str), Some("512Mi"));
    assert!(limits.get("nvidia.com/gpu").is_none());
    assert!(pod_spec(&root).get("nodeSelector").is_none());

    let containers = pod_spec(&root)
        .get("containers")
        .and_then(Node::as_sequence)
        .unwrap();
    assert_eq!(
        containers[0].get("image").and_then(Node::as_str),
        Some(report.image.as_str())
    );
}

#[tokio::test]
async fn test_dockerignore_extends_defaults() {
    let context = tempfile::tempdir().unwrap();
    write_context(context.path());
    fs::write(context.path().join(".dockerignore"), "data/\n").unwrap();

    let harness = Harness::new(FakeCluster::ready());
    harness
        .pipeline
        .submit_job(&build_request(context.path()))
        .await
        .unwrap();

    let files = &harness.registry.pushes()[0].files;
    assert!(files.iter().any(|f| f == "main.py"));
    assert!(!files.iter().any(|f| f.starts_with("data")));
}

#[tokio::test]
async fn test_missing_context_fails_before_manifest() {
    let harness = Harness::new(FakeCluster::ready());
    let request = build_request(std::path::Path::new("/nonexistent/build/context"));

    let err = harness.pipeline.submit_job(&request).await.unwrap_err();

    assert!(err.to_string().contains("image build failed"), "got {}", err);
    assert!(harness.registry.pushes().is_empty());
    assert!(harness.cluster.jobsets().is_empty());
}

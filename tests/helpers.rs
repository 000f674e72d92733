//! Test utilities for workload-submit
//!
//! `FakeCluster` stands in for both `gcloud` and `kubectl`: it answers the
//! exact invocations the pipeline issues from a small in-memory cluster
//! model and records every call.

#![allow(dead_code)]

use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use workload_submit::cluster::{FetchError, ManifestFetcher};
use workload_submit::core::{
    parse_documents, ClusterTarget, ImageSpec, Node, Settings, WorkloadRequest,
};
use workload_submit::image::{Image, Layer, Platform, Registry, RegistryError};
use workload_submit::shell::{CommandError, CommandOutput, CommandRunner, Invocation};
use workload_submit::{PipelineEvent, SubmissionPipeline};

pub const PROJECT: &str = "test-project";
pub const NAMESPACE: &str = "default";

/// In-memory view of everything the pipeline can observe or change
#[derive(Debug, Clone)]
pub struct ClusterState {
    pub project: String,
    pub crd_installed: bool,
    pub webhook_ready: bool,
    /// Whether the webhook starts serving once the controller is applied
    pub ready_after_install: bool,
    /// LocalQueue name -> ClusterQueue name
    pub local_queues: Vec<(String, String)>,
    pub flavor_labels: Vec<BTreeMap<String, String>>,
    pub node_labels: Vec<BTreeMap<String, String>>,
    /// Resources covered by the first resource group of every ClusterQueue
    pub covered: Vec<String>,
    /// Live JobSets by name
    pub jobsets: BTreeMap<String, String>,
    pub controller_manifest: Option<String>,
    pub patches: usize,
    pub calls: Vec<Invocation>,
}

pub struct FakeCluster {
    state: Mutex<ClusterState>,
}

impl FakeCluster {
    /// A cluster with a serving JobSet controller and nothing else
    pub fn ready() -> Self {
        Self {
            state: Mutex::new(ClusterState {
                project: PROJECT.to_string(),
                crd_installed: true,
                webhook_ready: true,
                ready_after_install: true,
                local_queues: Vec::new(),
                flavor_labels: Vec::new(),
                node_labels: Vec::new(),
                covered: vec!["cpu".to_string(), "memory".to_string()],
                jobsets: BTreeMap::new(),
                controller_manifest: None,
                patches: 0,
                calls: Vec::new(),
            }),
        }
    }

    pub fn without_jobset_controller(self) -> Self {
        self.update(|s| {
            s.crd_installed = false;
            s.webhook_ready = false;
        })
    }

    /// CRD present but the webhook has no live endpoint
    pub fn with_unhealthy_webhook(self) -> Self {
        self.update(|s| s.webhook_ready = false)
    }

    /// What `gcloud config get-value project` prints
    pub fn with_gcloud_project(self, project: &str) -> Self {
        self.update(|s| s.project = project.to_string())
    }

    pub fn never_ready(self) -> Self {
        self.update(|s| s.ready_after_install = false)
    }

    pub fn with_local_queue(self, name: &str, cluster_queue: &str) -> Self {
        self.update(|s| {
            s.local_queues
                .push((name.to_string(), cluster_queue.to_string()))
        })
    }

    pub fn with_flavor_label(self, key: &str, value: &str) -> Self {
        self.update(|s| {
            s.flavor_labels
                .push(BTreeMap::from([(key.to_string(), value.to_string())]))
        })
    }

    pub fn with_node_label(self, key: &str, value: &str) -> Self {
        self.update(|s| {
            s.node_labels
                .push(BTreeMap::from([(key.to_string(), value.to_string())]))
        })
    }

    pub fn with_covered(self, resources: &[&str]) -> Self {
        self.update(|s| s.covered = resources.iter().map(|r| r.to_string()).collect())
    }

    fn update(self, f: impl FnOnce(&mut ClusterState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn snapshot(&self) -> ClusterState {
        self.state.lock().unwrap().clone()
    }

    /// Every call as a shell-like line
    pub fn calls(&self) -> Vec<String> {
        self.snapshot().calls.iter().map(Invocation::display).collect()
    }

    pub fn call_count(&self) -> usize {
        self.snapshot().calls.len()
    }

    /// Index of the first call starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.starts_with(prefix))
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn jobsets(&self) -> BTreeMap<String, String> {
        self.snapshot().jobsets
    }

    pub fn patch_count(&self) -> usize {
        self.snapshot().patches
    }
}

#[async_trait]
impl CommandRunner for FakeCluster {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(invocation.clone());
        let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
        let output = match invocation.program.as_str() {
            "gcloud" => state.gcloud(&args),
            "kubectl" => state.kubectl(&args, invocation.stdin.as_deref()),
            other => CommandOutput::failed(format!("{}: command not found", other)),
        };
        Ok(output)
    }
}

fn not_found(what: &str) -> CommandOutput {
    CommandOutput::failed(format!("Error from server (NotFound): {} not found", what))
}

fn json_output(value: serde_json::Value) -> CommandOutput {
    CommandOutput::ok(value.to_string())
}

fn labelled_items(labels: &[BTreeMap<String, String>], spec: bool) -> serde_json::Value {
    let items: Vec<_> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| {
            if spec {
                json!({ "metadata": { "name": format!("flavor-{}", i) }, "spec": { "nodeLabels": l } })
            } else {
                json!({ "metadata": { "name": format!("node-{}", i), "labels": l } })
            }
        })
        .collect();
    json!({ "kind": "List", "items": items })
}

impl ClusterState {
    fn gcloud(&mut self, args: &[&str]) -> CommandOutput {
        match args {
            ["config", "get-value", "project"] => CommandOutput::ok(format!("{}\n", self.project)),
            ["container", "clusters", "get-credentials", ..] => {
                CommandOutput::new("", "kubeconfig entry generated", 0)
            }
            _ => CommandOutput::failed(format!("unexpected gcloud call: {:?}", args)),
        }
    }

    fn kubectl(&mut self, args: &[&str], stdin: Option<&str>) -> CommandOutput {
        match args {
            ["get", "crd", name] => {
                if self.crd_installed {
                    CommandOutput::ok(format!("{}   2024-01-01T00:00:00Z", name))
                } else {
                    not_found(&format!("customresourcedefinitions \"{}\"", name))
                }
            }
            ["get", "endpoints", name, ..] => {
                if !self.crd_installed {
                    return not_found(&format!("endpoints \"{}\"", name));
                }
                let addresses = if self.webhook_ready {
                    json!([{ "ip": "10.0.0.7" }])
                } else {
                    json!([])
                };
                json_output(json!({ "subsets": [{ "addresses": addresses }] }))
            }
            ["get", "localqueues.kueue.x-k8s.io", "-n", _, "-o", "json"] => {
                let items: Vec<_> = self
                    .local_queues
                    .iter()
                    .map(|(name, cq)| {
                        json!({ "metadata": { "name": name }, "spec": { "clusterQueue": cq } })
                    })
                    .collect();
                json_output(json!({ "items": items }))
            }
            ["get", "localqueues.kueue.x-k8s.io", name, ..] => {
                match self.local_queues.iter().find(|(q, _)| q == name) {
                    Some((q, cq)) => json_output(
                        json!({ "metadata": { "name": q }, "spec": { "clusterQueue": cq } }),
                    ),
                    None => not_found(&format!("localqueues \"{}\"", name)),
                }
            }
            ["get", "resourceflavors.kueue.x-k8s.io", ..] => {
                json_output(labelled_items(&self.flavor_labels, true))
            }
            ["get", "nodes", ..] => json_output(labelled_items(&self.node_labels, false)),
            ["get", "clusterqueues.kueue.x-k8s.io", name, ..] => {
                let resources: Vec<_> = self
                    .covered
                    .iter()
                    .map(|r| json!({ "name": r, "nominalQuota": "100" }))
                    .collect();
                json_output(json!({
                    "metadata": { "name": name },
                    "spec": { "resourceGroups": [{
                        "coveredResources": self.covered,
                        "flavors": [{ "name": "default-flavor", "resources": resources }]
                    }]}
                }))
            }
            ["patch", "clusterqueues.kueue.x-k8s.io", _, "--type=json", "-p", patch] => {
                let ops: Vec<serde_json::Value> = match serde_json::from_str(patch) {
                    Ok(ops) => ops,
                    Err(e) => return CommandOutput::failed(format!("invalid patch: {}", e)),
                };
                for op in &ops {
                    let path = op["path"].as_str().unwrap_or_default();
                    if path.ends_with("coveredResources/-") {
                        if let Some(resource) = op["value"].as_str() {
                            self.covered.push(resource.to_string());
                        }
                    }
                }
                self.patches += 1;
                CommandOutput::ok("clusterqueue.kueue.x-k8s.io patched")
            }
            ["delete", "deployment", ..] => CommandOutput::ok(""),
            ["apply", "--server-side", ..] => {
                self.controller_manifest = stdin.map(str::to_string);
                self.crd_installed = true;
                self.webhook_ready = self.ready_after_install;
                CommandOutput::ok("customresourcedefinition.apiextensions.k8s.io/jobsets serverside-applied")
            }
            ["rollout", "status", ..] => CommandOutput::ok("successfully rolled out"),
            ["delete", "jobsets.jobset.x-k8s.io", name, ..] => {
                self.jobsets.remove(*name);
                CommandOutput::ok("")
            }
            ["apply", "-n", _, "-f", "-"] => self.apply_jobset(stdin.unwrap_or_default()),
            _ => CommandOutput::failed(format!("unexpected kubectl call: {:?}", args)),
        }
    }

    fn apply_jobset(&mut self, yaml: &str) -> CommandOutput {
        if !self.crd_installed || !self.webhook_ready {
            return CommandOutput::failed(
                "Internal error occurred: failed calling webhook \"mjobset.kb.io\": no endpoints available",
            );
        }
        let value: serde_yaml::Value = match serde_yaml::from_str(yaml) {
            Ok(value) => value,
            Err(e) => return CommandOutput::failed(format!("error parsing manifest: {}", e)),
        };
        let Some(name) = value["metadata"]["name"].as_str() else {
            return CommandOutput::failed("manifest has no metadata.name");
        };
        if self.jobsets.contains_key(name) {
            return CommandOutput::failed(format!(
                "jobsets.jobset.x-k8s.io \"{}\" is immutable once created",
                name
            ));
        }
        self.jobsets.insert(name.to_string(), yaml.to_string());
        CommandOutput::ok(format!("jobset.jobset.x-k8s.io/{} created", name))
    }
}

/// A push as seen by the registry
#[derive(Debug, Clone)]
pub struct Pushed {
    pub base: String,
    pub destination: String,
    /// Paths inside the appended layer
    pub files: Vec<String>,
}

#[derive(Default)]
pub struct FakeRegistry {
    pub pulls: Mutex<Vec<String>>,
    pub pushes: Mutex<Vec<Pushed>>,
}

impl FakeRegistry {
    pub fn pushes(&self) -> Vec<Pushed> {
        self.pushes.lock().unwrap().clone()
    }
}

fn layer_entries(path: &Path) -> Result<Vec<String>, std::io::Error> {
    let file = std::fs::File::open(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut names = Vec::new();
    for entry in archive.entries()? {
        names.push(entry?.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn pull(&self, reference: &str, platform: &Platform) -> Result<Image, RegistryError> {
        self.pulls.lock().unwrap().push(reference.to_string());
        Ok(Image {
            source: reference.to_string(),
            digest: "sha256:base".to_string(),
            platform: platform.clone(),
            layers: vec![Layer::Remote {
                digest: "sha256:layer0".to_string(),
                size: 1024,
                media_type: "application/vnd.oci.image.layer.v1.tar+gzip".to_string(),
            }],
        })
    }

    async fn push(&self, image: &Image, destination: &str) -> Result<String, RegistryError> {
        let mut files = Vec::new();
        for path in image.local_layers() {
            files.extend(layer_entries(path).map_err(|e| RegistryError::Rejected {
                operation: "push",
                reference: destination.to_string(),
                message: e.to_string(),
            })?);
        }
        self.pushes.lock().unwrap().push(Pushed {
            base: image.pinned_source(),
            destination: destination.to_string(),
            files,
        });
        Ok(destination.to_string())
    }
}

/// Serves a fixed controller manifest set
pub struct StaticFetcher {
    body: String,
    fetches: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}

/// Trimmed-down controller release: a CRD, its deployment and the webhook service
pub const CONTROLLER_MANIFESTS: &str = r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: jobsets.jobset.x-k8s.io
spec:
  group: jobset.x-k8s.io
  versions:
    - name: v1alpha2
      schema:
        openAPIV3Schema:
          description: JobSet is the Schema for the jobsets API
          properties:
            spec:
              description: JobSetSpec defines the desired state of JobSet
              type: object
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: jobset-controller-manager
  namespace: jobset-system
spec:
  template:
    metadata:
      labels:
        control-plane: controller-manager
    spec:
      containers:
        - name: manager
          image: registry.k8s.io/jobset/jobset:v0.10.1
---
apiVersion: v1
kind: Service
metadata:
  name: jobset-webhook-service
  namespace: jobset-system
"#;

/// Fast readiness polling so timeouts resolve immediately
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.controller.readiness_attempts = 3;
    settings.controller.readiness_interval_secs = 0;
    settings
}

/// Everything a scenario needs to drive and inspect one pipeline
pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub registry: Arc<FakeRegistry>,
    pub fetcher: Arc<StaticFetcher>,
    pub events: Arc<Mutex<Vec<PipelineEvent>>>,
    pub pipeline: SubmissionPipeline,
}

impl Harness {
    pub fn new(cluster: FakeCluster) -> Self {
        let cluster = Arc::new(cluster);
        let registry = Arc::new(FakeRegistry::default());
        let fetcher = Arc::new(StaticFetcher::new(CONTROLLER_MANIFESTS));
        let events = Arc::new(Mutex::new(Vec::new()));

        let sink = events.clone();
        let pipeline = SubmissionPipeline::new(
            cluster.clone(),
            registry.clone(),
            fetcher.clone(),
            test_settings(),
        )
        .with_event_handler(move |event| sink.lock().unwrap().push(event));

        Self {
            cluster,
            registry,
            fetcher,
            events,
            pipeline,
        }
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }
}

/// A request for a pre-built image with no discovery hints
pub fn prebuilt_request(image: &str) -> WorkloadRequest {
    WorkloadRequest {
        image: ImageSpec::prebuilt(image),
        command: "python train.py".to_string(),
        cluster: ClusterTarget {
            project: None,
            name: "test-cluster".to_string(),
            location: "us-central1".to_string(),
        },
        ..Default::default()
    }
}

/// A request that layers `context` onto a python base image
pub fn build_request(context: &Path) -> WorkloadRequest {
    WorkloadRequest {
        image: ImageSpec::build("python:3.11-slim", context),
        ..prebuilt_request("unused")
    }
}

/// Parse the one live JobSet named `name`
pub fn live_jobset(cluster: &FakeCluster, name: &str) -> Node {
    let yaml = cluster
        .jobsets()
        .remove(name)
        .unwrap_or_else(|| panic!("no live JobSet named {}", name));
    let mut docs = parse_documents(&yaml).unwrap();
    assert_eq!(docs.len(), 1, "expected a single JobSet document");
    docs.remove(0)
}

/// First pod spec of the first replicated job
pub fn pod_spec(root: &Node) -> &Node {
    let jobs = root
        .get_path(&["spec", "replicatedJobs"])
        .and_then(Node::as_sequence)
        .unwrap();
    jobs[0]
        .get_path(&["template", "spec", "template", "spec"])
        .unwrap()
}

/// Resource limits of the workload container
pub fn limits(root: &Node) -> &Node {
    let containers = pod_spec(root)
        .get("containers")
        .and_then(Node::as_sequence)
        .unwrap();
    containers[0].get_path(&["resources", "limits"]).unwrap()
}

/// Assert no call ever changed cluster state
pub fn assert_no_cluster_mutation(cluster: &FakeCluster) {
    for call in cluster.calls() {
        assert!(
            !(call.starts_with("kubectl apply")
                || call.starts_with("kubectl delete")
                || call.starts_with("kubectl patch")),
            "unexpected mutating call: {}",
            call
        );
    }
}

//! Cluster-side stages: access, discovery, quota and controller prerequisites

pub mod fetch;
pub mod gcloud;
pub mod kubectl;
pub mod prerequisites;
pub mod quota;
pub mod resolver;
pub mod types;

pub use fetch::{FetchError, HttpManifestFetcher, ManifestFetcher};
pub use gcloud::Gcloud;
pub use kubectl::{Kubectl, KubectlError};
pub use prerequisites::{prepare_manifests, PrerequisiteManager};
pub use quota::{QueueBinding, QuotaReconciler};
pub use resolver::{Resolution, ResourceResolver};

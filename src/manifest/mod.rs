//! Workload manifest generation and delivery

pub mod apply;
pub mod jobset;

pub use apply::ManifestApplier;
pub use jobset::{render, ManifestDocument, ManifestInput};

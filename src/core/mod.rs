//! Core domain models for workload submission
//!
//! This module defines the request, settings, accelerator profiles, the
//! typed manifest tree, and the outcome types each stage reports.

pub mod accelerator;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod naming;
pub mod request;
pub mod state;

pub use accelerator::*;
pub use config::*;
pub use context::*;
pub use document::{emit_documents, parse_documents, DocumentError, Node, Number};
pub use error::*;
pub use request::*;
pub use state::*;

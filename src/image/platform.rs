//! Target platform (`os/arch`)

use crate::core::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system and architecture an image is built for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
}

impl Platform {
    /// Parse `os/arch`. Both parts must be non-empty and nothing else may follow.
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        let mut parts = s.trim().split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(os), Some(arch), None) if !os.is_empty() && !arch.is_empty() => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
            }),
            _ => Err(PipelineError::configuration(format!(
                "invalid platform '{}': expected <os>/<arch>",
                s
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)
    }
}

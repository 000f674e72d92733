//! Workload request model

use crate::core::PipelineError;
use crate::image::Platform;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default build platform when none is given
pub const DEFAULT_PLATFORM: &str = "linux/amd64";

fn default_platform() -> String {
    DEFAULT_PLATFORM.to_string()
}

/// Raw image fields as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Pre-built image reference, used as-is
    #[serde(default)]
    pub image: Option<String>,

    /// Base image to layer the build context onto
    #[serde(default)]
    pub base_image: Option<String>,

    /// Directory whose filtered contents become the new layer
    #[serde(default)]
    pub build_context: Option<PathBuf>,

    /// Target platform in `os/arch` form
    #[serde(default = "default_platform")]
    pub platform: String,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            image: None,
            base_image: None,
            build_context: None,
            platform: default_platform(),
        }
    }
}

/// Where the workload image comes from, once validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Opaque reference passed straight through
    Prebuilt(String),
    /// Base image plus a build context to layer on top of it
    Build {
        base: String,
        context: PathBuf,
        platform: Platform,
    },
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ImageSpec {
    pub fn prebuilt(reference: impl Into<String>) -> Self {
        Self {
            image: Some(reference.into()),
            ..Default::default()
        }
    }

    pub fn build(base: impl Into<String>, context: impl Into<PathBuf>) -> Self {
        Self {
            base_image: Some(base.into()),
            build_context: Some(context.into()),
            ..Default::default()
        }
    }

    /// Resolve the raw fields into exactly one image source
    pub fn source(&self) -> Result<ImageSource, PipelineError> {
        match (non_empty(&self.image), non_empty(&self.base_image)) {
            (None, None) => Err(PipelineError::configuration(
                "either a pre-built image or a base image must be provided",
            )),
            (Some(_), Some(_)) => Err(PipelineError::configuration(
                "cannot provide both a pre-built image and a base image",
            )),
            (Some(reference), None) => {
                if self.build_context.is_some() {
                    return Err(PipelineError::configuration(
                        "a build context cannot be used with a pre-built image",
                    ));
                }
                Ok(ImageSource::Prebuilt(reference.to_string()))
            }
            (None, Some(base)) => {
                let context = self.build_context.clone().ok_or_else(|| {
                    PipelineError::configuration(
                        "a build context must be provided when a base image is used",
                    )
                })?;
                let platform = Platform::parse(&self.platform)?;
                Ok(ImageSource::Build {
                    base: base.to_string(),
                    context,
                    platform,
                })
            }
        }
    }
}

/// Slices × replicas shape plus lifecycle knobs. Unset fields get defaults at render time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingShape {
    #[serde(default)]
    pub slices: Option<u32>,

    #[serde(default)]
    pub replicas_per_slice: Option<u32>,

    #[serde(default)]
    pub max_restarts: Option<u32>,

    #[serde(default)]
    pub ttl_seconds_after_finished: Option<u64>,
}

/// Identity of the target cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTarget {
    /// Project id; inferred from gcloud configuration when unset
    #[serde(default)]
    pub project: Option<String>,
    pub name: String,
    pub location: String,
}

/// Everything needed to submit one workload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRequest {
    #[serde(default)]
    pub image: ImageSpec,

    /// Shell command run inside the container
    pub command: String,

    /// Accelerator type; discovered from the cluster when unset
    #[serde(default)]
    pub accelerator: Option<String>,

    #[serde(default)]
    pub scaling: ScalingShape,

    pub cluster: ClusterTarget,

    /// LocalQueue name; discovered from the cluster when unset
    #[serde(default)]
    pub queue: Option<String>,

    /// JobSet name; generated when unset
    #[serde(default)]
    pub workload_name: Option<String>,

    /// Write the manifest here instead of applying it
    #[serde(default)]
    pub output_manifest: Option<PathBuf>,
}

impl WorkloadRequest {
    /// Reject malformed requests before anything touches the cluster
    pub fn validate(&self) -> Result<ImageSource, PipelineError> {
        if self.command.trim().is_empty() {
            return Err(PipelineError::configuration("a command to run is required"));
        }
        if self.cluster.name.trim().is_empty() {
            return Err(PipelineError::configuration("a cluster name is required"));
        }
        if self.cluster.location.trim().is_empty() {
            return Err(PipelineError::configuration("a cluster location is required"));
        }
        if self.scaling.slices == Some(0) {
            return Err(PipelineError::configuration("slice count must be at least 1"));
        }
        if self.scaling.replicas_per_slice == Some(0) {
            return Err(PipelineError::configuration(
                "replicas per slice must be at least 1",
            ));
        }
        self.image.source()
    }

    /// Explicit queue, ignoring blank input
    pub fn requested_queue(&self) -> Option<&str> {
        non_empty(&self.queue)
    }

    /// Explicit accelerator, ignoring blank input
    pub fn requested_accelerator(&self) -> Option<&str> {
        non_empty(&self.accelerator)
    }
}

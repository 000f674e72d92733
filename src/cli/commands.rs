//! CLI command definitions

use crate::core::{
    request::DEFAULT_PLATFORM, ClusterTarget, ImageSpec, ScalingShape, WorkloadRequest,
};
use clap::Args;
use std::path::PathBuf;

/// Submit a workload to the cluster
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Print the submission report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a workload request without touching the cluster
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    #[command(flatten)]
    pub request: RequestArgs,
}

/// Workload request flags shared by `run` and `validate`
#[derive(Debug, Args, Clone)]
pub struct RequestArgs {
    /// Pre-built image reference to run as-is
    #[arg(short = 'i', long)]
    pub docker_image: Option<String>,

    /// Base image to layer the build context onto
    #[arg(long)]
    pub base_docker_image: Option<String>,

    /// Directory added as a layer on top of the base image
    #[arg(short = 'c', long)]
    pub build_context: Option<PathBuf>,

    /// Target platform for the built image (os/arch)
    #[arg(short = 'f', long, default_value = DEFAULT_PLATFORM)]
    pub platform: String,

    /// Shell command to run inside the container
    #[arg(short = 'e', long)]
    pub command: String,

    /// Accelerator type; discovered from the cluster when omitted
    #[arg(short = 'a', long)]
    pub accelerator_type: Option<String>,

    /// Write the manifest here instead of applying it
    #[arg(short = 'o', long)]
    pub output_manifest: Option<PathBuf>,

    /// Name of the target GKE cluster
    #[arg(long)]
    pub cluster_name: String,

    /// Region or zone of the target cluster
    #[arg(long)]
    pub cluster_location: String,

    /// GCP project; read from gcloud configuration when omitted
    #[arg(short = 'p', long)]
    pub project: Option<String>,

    /// JobSet name; generated when omitted
    #[arg(short = 'w', long)]
    pub workload_name: Option<String>,

    /// Kueue LocalQueue; discovered from the cluster when omitted
    #[arg(long)]
    pub kueue_queue: Option<String>,

    /// Number of slices
    #[arg(long)]
    pub num_slices: Option<u32>,

    /// Replicas per slice
    #[arg(long)]
    pub vms_per_slice: Option<u32>,

    /// JobSet restart budget
    #[arg(long)]
    pub max_restarts: Option<u32>,

    /// Seconds to keep the finished JobSet around
    #[arg(long)]
    pub ttl_seconds_after_finished: Option<u64>,
}

impl RequestArgs {
    /// Build the request; validation happens in the pipeline
    pub fn to_request(&self) -> WorkloadRequest {
        WorkloadRequest {
            image: ImageSpec {
                image: self.docker_image.clone(),
                base_image: self.base_docker_image.clone(),
                build_context: self.build_context.clone(),
                platform: self.platform.clone(),
            },
            command: self.command.clone(),
            accelerator: self.accelerator_type.clone(),
            scaling: ScalingShape {
                slices: self.num_slices,
                replicas_per_slice: self.vms_per_slice,
                max_restarts: self.max_restarts,
                ttl_seconds_after_finished: self.ttl_seconds_after_finished,
            },
            cluster: ClusterTarget {
                project: self.project.clone(),
                name: self.cluster_name.clone(),
                location: self.cluster_location.clone(),
            },
            queue: self.kueue_queue.clone(),
            workload_name: self.workload_name.clone(),
            output_manifest: self.output_manifest.clone(),
        }
    }
}

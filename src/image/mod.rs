//! Container image assembly
//!
//! A pre-built reference passes straight through. Otherwise the build
//! context is archived (minus ignored paths), appended as one layer on top of
//! the base image for the requested platform, and pushed under a freshly
//! synthesized reference.

pub mod archive;
pub mod ignore;
pub mod platform;
pub mod registry;

pub use archive::{archive_context, ContextArchive};
pub use ignore::{IgnoreMatcher, DEFAULT_IGNORE_PATTERNS};
pub use platform::Platform;
pub use registry::{CraneRegistry, Image, Layer, Registry, RegistryError};

use crate::core::naming::{current_user, random_lowercase};
use crate::core::{ImageSource, PipelineError};
use chrono::{DateTime, Local};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// `<registry>/<project>/<user>-runner:<4 random>-<YYYY-MM-DD-HH-MM-SS>`
pub fn destination_reference(
    registry: &str,
    project: &str,
    user: &str,
    at: DateTime<Local>,
) -> String {
    format!(
        "{}/{}/{}-runner:{}-{}",
        registry.trim_end_matches('/'),
        project,
        user,
        random_lowercase(4),
        at.format("%Y-%m-%d-%H-%M-%S")
    )
}

/// Produces the image reference a workload will run
pub struct ImageAssembler {
    registry: Arc<dyn Registry>,
    registry_host: String,
}

impl ImageAssembler {
    pub fn new(registry: Arc<dyn Registry>, registry_host: impl Into<String>) -> Self {
        Self {
            registry,
            registry_host: registry_host.into(),
        }
    }

    /// Resolve the image source to a pushed, fully qualified reference
    pub async fn assemble(
        &self,
        source: &ImageSource,
        project_id: &str,
    ) -> Result<String, PipelineError> {
        match source {
            ImageSource::Prebuilt(reference) => {
                info!(image = %reference, "Using pre-built image");
                Ok(reference.clone())
            }
            ImageSource::Build {
                base,
                context,
                platform,
            } => self.build(base, context, platform, project_id).await,
        }
    }

    async fn build(
        &self,
        base: &str,
        context: &Path,
        platform: &Platform,
        project_id: &str,
    ) -> Result<String, PipelineError> {
        let destination =
            destination_reference(&self.registry_host, project_id, &current_user(), Local::now());
        info!(
            base,
            context = %context.display(),
            %platform,
            %destination,
            "Building image"
        );

        let matcher = IgnoreMatcher::for_context(context)
            .map_err(|e| PipelineError::ImageBuild(e.to_string()))?;

        // Dropping `archive` removes the temporary file on every path out of here
        let archive = archive_context(context, matcher).await.map_err(|e| {
            PipelineError::ImageBuild(format!(
                "failed to archive build context {}: {}",
                context.display(),
                e
            ))
        })?;

        let base_image = self.registry.pull(base, platform).await.map_err(|e| {
            PipelineError::ImageBuild(format!("failed to pull base image {}: {}", base, e))
        })?;

        let image = base_image.append_layer(Layer::Archive {
            path: archive.path().to_path_buf(),
            size: archive.size,
        });

        let pushed = self.registry.push(&image, &destination).await.map_err(|e| {
            PipelineError::ImageBuild(format!("failed to push {}: {}", destination, e))
        })?;

        info!(image = %pushed, files = archive.entries.len(), "Image built and pushed");
        Ok(pushed)
    }
}

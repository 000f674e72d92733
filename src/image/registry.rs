//! Container registry access
//!
//! An [`Image`] is the in-memory view of a pulled image: its pinned digest,
//! target platform and ordered layer list. Appending a layer yields a new
//! image and leaves the original untouched; the registry adapter turns the
//! result into a push.

use super::platform::Platform;
use crate::shell::{CommandError, CommandRunner, Invocation};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry command failed: {0}")]
    Command(#[from] CommandError),

    #[error("{operation} {reference} failed: {message}")]
    Rejected {
        operation: &'static str,
        reference: String,
        message: String,
    },

    #[error("unreadable manifest for {reference}: {message}")]
    InvalidManifest { reference: String, message: String },
}

/// One image layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    /// Already stored in the registry
    Remote {
        digest: String,
        size: u64,
        media_type: String,
    },
    /// Local gzip tarball not yet uploaded
    Archive { path: PathBuf, size: u64 },
}

/// A pulled (and possibly extended) image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Reference the image was pulled from
    pub source: String,
    /// Manifest digest of the pulled image for `platform`
    pub digest: String,
    pub platform: Platform,
    pub layers: Vec<Layer>,
}

impl Image {
    /// New image with `layer` on top. Everything else is unchanged.
    pub fn append_layer(&self, layer: Layer) -> Image {
        let mut next = self.clone();
        next.layers.push(layer);
        next
    }

    /// Local layers in stacking order
    pub fn local_layers(&self) -> impl Iterator<Item = &Path> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Archive { path, .. } => Some(path.as_path()),
            Layer::Remote { .. } => None,
        })
    }

    /// Source reference pinned to the pulled digest
    pub fn pinned_source(&self) -> String {
        format!("{}@{}", repository_of(&self.source), self.digest)
    }
}

/// Reference with any tag or digest stripped
pub fn repository_of(reference: &str) -> &str {
    let without_digest = reference.split('@').next().unwrap_or(reference);
    let name_start = without_digest.rfind('/').map(|i| i + 1).unwrap_or(0);
    match without_digest[name_start..].find(':') {
        Some(colon) => &without_digest[..name_start + colon],
        None => without_digest,
    }
}

/// Pull and push operations the image assembler needs
#[async_trait]
pub trait Registry: Send + Sync {
    /// Resolve `reference` for `platform` into its digest and layers
    async fn pull(&self, reference: &str, platform: &Platform) -> Result<Image, RegistryError>;

    /// Push `image` to `destination`, returning the pushed reference
    async fn push(&self, image: &Image, destination: &str) -> Result<String, RegistryError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestLayer {
    #[serde(default)]
    media_type: String,
    #[serde(default)]
    size: u64,
    digest: String,
}

#[derive(Debug, Deserialize)]
struct ImageManifest {
    #[serde(default)]
    layers: Vec<ManifestLayer>,
}

/// [`Registry`] backed by the `crane` CLI
pub struct CraneRegistry {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl CraneRegistry {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "crane".to_string(),
        }
    }

    /// Use a different `crane` binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn crane(
        &self,
        operation: &'static str,
        reference: &str,
        args: Vec<String>,
    ) -> Result<String, RegistryError> {
        let invocation = Invocation::new(&self.program, args);
        debug!(command = %invocation.display(), "Running crane");
        let output = self.runner.run(&invocation).await?;
        if !output.success() {
            return Err(RegistryError::Rejected {
                operation,
                reference: reference.to_string(),
                message: output.diagnostics(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Registry for CraneRegistry {
    async fn pull(&self, reference: &str, platform: &Platform) -> Result<Image, RegistryError> {
        let platform_arg = platform.to_string();

        let digest = self
            .crane(
                "digest",
                reference,
                vec![
                    "digest".into(),
                    "--platform".into(),
                    platform_arg.clone(),
                    reference.into(),
                ],
            )
            .await?
            .trim()
            .to_string();
        if digest.is_empty() {
            return Err(RegistryError::InvalidManifest {
                reference: reference.to_string(),
                message: "empty digest".to_string(),
            });
        }

        let raw = self
            .crane(
                "manifest",
                reference,
                vec![
                    "manifest".into(),
                    "--platform".into(),
                    platform_arg,
                    reference.into(),
                ],
            )
            .await?;
        let manifest: ImageManifest =
            serde_json::from_str(&raw).map_err(|e| RegistryError::InvalidManifest {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;

        let layers = manifest
            .layers
            .into_iter()
            .map(|l| Layer::Remote {
                digest: l.digest,
                size: l.size,
                media_type: l.media_type,
            })
            .collect::<Vec<_>>();

        info!(reference, %digest, layers = layers.len(), "Pulled base image");
        Ok(Image {
            source: reference.to_string(),
            digest,
            platform: platform.clone(),
            layers,
        })
    }

    async fn push(&self, image: &Image, destination: &str) -> Result<String, RegistryError> {
        let base = image.pinned_source();
        let local: Vec<&Path> = image.local_layers().collect();

        let args = if local.is_empty() {
            vec!["copy".to_string(), base, destination.to_string()]
        } else {
            let mut args = vec![
                "append".to_string(),
                "--platform".to_string(),
                image.platform.to_string(),
                "-b".to_string(),
                base,
            ];
            for path in &local {
                args.push("-f".to_string());
                args.push(path.display().to_string());
            }
            args.push("-t".to_string());
            args.push(destination.to_string());
            args
        };

        self.crane("push", destination, args).await?;
        info!(destination, new_layers = local.len(), "Pushed image");
        Ok(destination.to_string())
    }
}

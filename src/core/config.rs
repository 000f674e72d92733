//! Pipeline settings loaded from YAML
//!
//! Settings are built once at startup and handed by reference to every
//! stage. Every field has a default, so an empty file (or no file) is valid.

use crate::execution::RetryPolicy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Namespace holding LocalQueues and JobSets
    pub namespace: String,

    /// Queue used when none is given and none can be discovered
    pub default_queue: String,

    /// Registry host workload images are pushed to
    pub registry: String,

    /// Timeout applied to every external command (in seconds)
    pub command_timeout_secs: u64,

    pub controller: ControllerSettings,

    pub quota: QuotaSettings,
}

/// Where the JobSet controller comes from and how to tell it is healthy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Versioned multi-document manifest set
    pub manifest_url: String,
    pub crd_name: String,
    pub namespace: String,
    pub deployment: String,
    pub webhook_service: String,

    /// `kubectl rollout status` timeout (in seconds)
    pub rollout_timeout_secs: u64,

    /// Webhook endpoint polling budget
    pub readiness_attempts: u32,
    pub readiness_interval_secs: u64,
}

/// Static ceilings appended when a ClusterQueue lacks coverage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSettings {
    pub cpu: String,
    pub memory: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            default_queue: "default-queue".to_string(),
            registry: "gcr.io".to_string(),
            command_timeout_secs: 600,
            controller: ControllerSettings::default(),
            quota: QuotaSettings::default(),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            manifest_url:
                "https://github.com/kubernetes-sigs/jobset/releases/download/v0.10.1/manifests.yaml"
                    .to_string(),
            crd_name: "jobsets.jobset.x-k8s.io".to_string(),
            namespace: "jobset-system".to_string(),
            deployment: "jobset-controller-manager".to_string(),
            webhook_service: "jobset-webhook-service".to_string(),
            rollout_timeout_secs: 300,
            readiness_attempts: 60,
            readiness_interval_secs: 5,
        }
    }
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            cpu: "10000".to_string(),
            memory: "10000Gi".to_string(),
        }
    }
}

impl ControllerSettings {
    /// Polling policy for webhook readiness
    pub fn readiness_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.readiness_attempts,
            Duration::from_secs(self.readiness_interval_secs),
        )
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            anyhow::bail!("namespace must not be empty");
        }
        if self.default_queue.trim().is_empty() {
            anyhow::bail!("default_queue must not be empty");
        }
        if self.registry.trim().is_empty() {
            anyhow::bail!("registry must not be empty");
        }
        if self.command_timeout_secs == 0 {
            anyhow::bail!("command_timeout_secs must be greater than zero");
        }
        if self.controller.readiness_attempts == 0 {
            anyhow::bail!("controller.readiness_attempts must be greater than zero");
        }
        if !self.controller.manifest_url.starts_with("http://")
            && !self.controller.manifest_url.starts_with("https://")
        {
            anyhow::bail!(
                "controller.manifest_url must be an http(s) URL: {}",
                self.controller.manifest_url
            );
        }
        Ok(())
    }
}

//! Accelerator resource profiles

/// Node label GKE sets on GPU nodes
pub const GKE_ACCELERATOR_LABEL: &str = "cloud.google.com/gke-accelerator";

/// Node label GKE sets on TPU nodes
pub const GKE_TPU_ACCELERATOR_LABEL: &str = "cloud.google.com/gke-tpu-accelerator";

pub const NVIDIA_GPU_RESOURCE: &str = "nvidia.com/gpu";
pub const GOOGLE_TPU_RESOURCE: &str = "google.com/tpu";

/// Extended resource requested per pod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimit {
    pub resource: &'static str,
    pub count: u32,
}

/// Per-pod resource limits and node selection for an accelerator type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceleratorProfile {
    pub cpu: &'static str,
    pub memory: &'static str,
    pub device: Option<DeviceLimit>,
    /// Node label key the accelerator name is matched against
    pub selector_key: &'static str,
}

const fn gpu(cpu: &'static str, memory: &'static str, count: u32) -> AcceleratorProfile {
    AcceleratorProfile {
        cpu,
        memory,
        device: Some(DeviceLimit {
            resource: NVIDIA_GPU_RESOURCE,
            count,
        }),
        selector_key: GKE_ACCELERATOR_LABEL,
    }
}

const fn tpu(cpu: &'static str, memory: &'static str, count: u32) -> AcceleratorProfile {
    AcceleratorProfile {
        cpu,
        memory,
        device: Some(DeviceLimit {
            resource: GOOGLE_TPU_RESOURCE,
            count,
        }),
        selector_key: GKE_TPU_ACCELERATOR_LABEL,
    }
}

/// Conservative CPU-only limits
pub const CPU_ONLY: AcceleratorProfile = AcceleratorProfile {
    cpu: "0.5",
    memory: "512Mi",
    device: None,
    selector_key: GKE_ACCELERATOR_LABEL,
};

/// Unlisted NVIDIA identifiers
pub const GENERIC_GPU: AcceleratorProfile = gpu("4", "16Gi", 1);

/// Unlisted TPU identifiers
pub const GENERIC_TPU: AcceleratorProfile = tpu("8", "32Gi", 4);

static KNOWN_PROFILES: &[(&str, AcceleratorProfile)] = &[
    ("nvidia-tesla-a100", gpu("8", "64Gi", 1)),
    ("nvidia-a100-80gb", gpu("12", "85Gi", 1)),
    ("nvidia-h100-80gb", gpu("24", "200Gi", 1)),
    ("nvidia-l4", gpu("4", "16Gi", 1)),
    ("nvidia-tesla-t4", gpu("4", "15Gi", 1)),
    ("tpu-v4-podslice", tpu("16", "128Gi", 4)),
    ("tpu-v5-lite-podslice", tpu("24", "48Gi", 4)),
];

impl AcceleratorProfile {
    /// Look up the profile for an accelerator type.
    ///
    /// Exact table matches win; otherwise a vendor substring picks a generic
    /// profile; anything else (including the empty string) is CPU-only.
    pub fn for_accelerator(accelerator: &str) -> AcceleratorProfile {
        let accelerator = accelerator.trim();
        if let Some((_, profile)) = KNOWN_PROFILES
            .iter()
            .find(|(name, _)| *name == accelerator)
        {
            return *profile;
        }

        let lowered = accelerator.to_ascii_lowercase();
        if lowered.contains("nvidia") {
            GENERIC_GPU
        } else if lowered.contains("tpu") {
            GENERIC_TPU
        } else {
            CPU_ONLY
        }
    }

    /// Device count, zero for CPU-only profiles
    pub fn device_count(&self) -> u32 {
        self.device.map(|d| d.count).unwrap_or(0)
    }
}

/// Names of the accelerators with dedicated profiles
pub fn known_accelerators() -> impl Iterator<Item = &'static str> {
    KNOWN_PROFILES.iter().map(|(name, _)| *name)
}

//! Capability detection - Map host RAM and CPU count to a resource tier

use serde::{Deserialize, Serialize};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::{info, warn};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Per-session resource configuration handed to the rendering engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBudget {
    /// HTTP cache ceiling in MB
    pub cache_size_mb: u32,
    /// Interval between keep-alive ticks in ms
    pub keep_alive_interval_ms: u64,
    /// JavaScript heap ceiling in MB
    pub max_heap_mb: u32,
    /// Raster worker threads
    pub raster_threads: u32,
}

/// Discrete host capability class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceTier {
    Low,
    Medium,
    High,
}

impl ResourceTier {
    /// Classify a host by total RAM (GB) and logical CPU count
    pub fn classify(ram_gb: f64, cpu_count: usize) -> Self {
        if ram_gb < 4.0 || cpu_count <= 2 {
            Self::Low
        } else if ram_gb < 8.0 || cpu_count <= 4 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn budget(&self) -> SessionBudget {
        match self {
            Self::Low => SessionBudget {
                cache_size_mb: 20,
                keep_alive_interval_ms: 60_000,
                max_heap_mb: 256,
                raster_threads: 1,
            },
            Self::Medium => SessionBudget {
                cache_size_mb: 30,
                keep_alive_interval_ms: 45_000,
                max_heap_mb: 512,
                raster_threads: 2,
            },
            Self::High => SessionBudget {
                cache_size_mb: 50,
                keep_alive_interval_ms: 30_000,
                max_heap_mb: 1024,
                raster_threads: 4,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// Source of host hardware facts; `None` means the value could not be read
pub trait HostProbe {
    fn total_ram_gb(&self) -> Option<f64>;
    fn logical_cpu_count(&self) -> Option<usize>;
}

/// Host probe backed by `sysinfo`
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_memory(MemoryRefreshKind::everything())
                .with_cpu(CpuRefreshKind::everything()),
        );
        Self { system }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoProbe {
    fn total_ram_gb(&self) -> Option<f64> {
        match self.system.total_memory() {
            0 => None,
            bytes => Some(bytes as f64 / BYTES_PER_GB),
        }
    }

    fn logical_cpu_count(&self) -> Option<usize> {
        match self.system.cpus().len() {
            0 => None,
            count => Some(count),
        }
    }
}

/// Result of capability detection, fixed for the life of the process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostCapability {
    pub tier: ResourceTier,
    pub budget: SessionBudget,
    pub ram_gb: Option<f64>,
    pub cpu_count: Option<usize>,
}

impl HostCapability {
    /// Whether the tier came from real host figures rather than the fallback
    pub fn probed(&self) -> bool {
        self.ram_gb.is_some() && self.cpu_count.is_some()
    }
}

/// Detect the tier; an unreadable host falls back to `Medium`
pub fn detect(probe: &dyn HostProbe) -> HostCapability {
    let ram_gb = probe.total_ram_gb().filter(|gb| gb.is_finite() && *gb > 0.0);
    let cpu_count = probe.logical_cpu_count().filter(|count| *count > 0);

    let tier = match (ram_gb, cpu_count) {
        (Some(ram), Some(cpus)) => {
            let tier = ResourceTier::classify(ram, cpus);
            info!(
                "Host has {:.1} GB RAM and {} logical CPUs, using {} tier",
                ram,
                cpus,
                tier.label()
            );
            tier
        }
        _ => {
            warn!("Could not read host capabilities, using Medium tier");
            ResourceTier::Medium
        }
    };

    HostCapability {
        tier,
        budget: tier.budget(),
        ram_gb,
        cpu_count,
    }
}

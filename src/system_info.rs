//! Host facts attached to every profiling entry
//!
//! Collected once per engine instance and reused for every entry produced in
//! that process; entries from different runs of the same log may carry
//! different snapshots.

use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Sentinel for host facts the platform refuses to report.
pub const UNKNOWN: &str = "unknown";

/// Immutable snapshot of the host a measurement was taken on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// OS name, e.g. `Ubuntu`
    pub os_name: String,
    /// OS version string
    pub os_version: String,
    /// CPU architecture, e.g. `x86_64`
    pub cpu_arch: String,
    /// Logical core count, if determinable
    pub logical_cores: Option<usize>,
    /// Physical core count, if determinable
    pub physical_cores: Option<usize>,
    /// Total RAM in megabytes
    pub total_memory_mb: u64,
    /// Highest CPU frequency observed across cores, in MHz
    pub max_cpu_frequency_mhz: Option<u64>,
    /// rustc version the instrumented binary was built with
    pub rustc_version: String,
}

impl SystemInfo {
    /// Collect a snapshot of the current host.
    ///
    /// Individual facts the platform cannot provide (e.g. CPU frequency in a
    /// sandbox) become sentinels rather than failing the whole collection.
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let logical_cores = match sys.cpus().len() {
            0 => std::thread::available_parallelism().ok().map(|n| n.get()),
            n => Some(n),
        };
        let max_cpu_frequency_mhz = sys
            .cpus()
            .iter()
            .map(|cpu| cpu.frequency())
            .max()
            .filter(|&freq| freq > 0);

        Self {
            os_name: System::name().unwrap_or_else(|| UNKNOWN.to_string()),
            os_version: System::os_version().unwrap_or_else(|| UNKNOWN.to_string()),
            cpu_arch: std::env::consts::ARCH.to_string(),
            logical_cores,
            physical_cores: System::physical_core_count(),
            total_memory_mb: sys.total_memory() / (1024 * 1024),
            max_cpu_frequency_mhz,
            rustc_version: env!("PERFIL_RUSTC_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_never_panics_and_fills_strings() {
        let info = SystemInfo::collect();
        assert!(!info.os_name.is_empty());
        assert!(!info.cpu_arch.is_empty());
        assert!(!info.rustc_version.is_empty());
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let info = SystemInfo::collect();
        let json = serde_json::to_string(&info).unwrap();
        let back: SystemInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, back);
    }
}

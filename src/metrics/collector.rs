//! Host metrics collection backed by `sysinfo`.

use crate::config::Config;
use crate::error::{Result, SystemError};
use crate::metrics::{
    data::*,
    traits::MetricsSource,
};
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{Disks, Networks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::time;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// System metrics collector using sysinfo.
pub struct SystemCollector {
    system: System,
    disks: Disks,
    networks: Networks,
    disk_root: PathBuf,
    sample_interval: Duration,
    last_timestamp: Option<NaiveDateTime>,
}

impl SystemCollector {
    /// Create a collector watching `/` with the default sampling interval.
    pub fn new() -> Self {
        Self::with_settings("/", Duration::from_millis(crate::DEFAULT_SAMPLE_INTERVAL_MS))
    }

    /// Create a collector using the disk root and sampling interval from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::with_settings(
            &config.disk_root,
            Duration::from_millis(config.sample_interval_ms),
        )
    }

    fn with_settings(disk_root: impl AsRef<Path>, sample_interval: Duration) -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_usage();

        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            disk_root: disk_root.as_ref().to_path_buf(),
            sample_interval: sample_interval.max(MINIMUM_CPU_UPDATE_INTERVAL),
            last_timestamp: None,
        }
    }

    /// The filesystem root whose usage is reported.
    pub fn disk_root(&self) -> &Path {
        &self.disk_root
    }

    /// Refresh CPU usage across a bounded interval; usage is a delta between two reads.
    async fn sample_cpu(&mut self) -> Result<CpuInfo> {
        self.system.refresh_cpu_usage();
        time::sleep(self.sample_interval).await;
        self.system.refresh_cpu_usage();

        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(SystemError::metrics_unavailable("No CPU information available"));
        }

        let usage = cpus.iter().map(|cpu| cpu.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64;

        Ok(CpuInfo {
            usage_percent: round_to(usage.clamp(0.0, 100.0), 1),
        })
    }

    fn collect_memory_info(&mut self) -> Result<MemoryInfo> {
        self.system.refresh_memory();

        let total_bytes = self.system.total_memory();
        if total_bytes == 0 {
            return Err(SystemError::metrics_unavailable("Total memory reported as zero"));
        }
        let used_bytes = self.system.used_memory().min(total_bytes);
        let available_bytes = self.system.available_memory();

        Ok(MemoryInfo {
            percent: round_to(used_bytes as f64 / total_bytes as f64 * 100.0, 1),
            used_gb: round_to(used_bytes as f64 / BYTES_PER_GB, 2),
            available_gb: round_to(available_bytes as f64 / BYTES_PER_GB, 2),
        })
    }

    /// Usage of the filesystem holding `disk_root`, i.e. the deepest mount point above it.
    fn collect_disk_info(&mut self) -> Result<DiskInfo> {
        self.disks.refresh();

        let disk = self
            .disks
            .iter()
            .filter(|disk| self.disk_root.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().components().count())
            .ok_or_else(|| {
                SystemError::metrics_unavailable(format!(
                    "No filesystem mounted at {}",
                    self.disk_root.display()
                ))
            })?;

        let total_bytes = disk.total_space();
        if total_bytes == 0 {
            return Err(SystemError::metrics_unavailable(format!(
                "Filesystem at {} reports zero capacity",
                disk.mount_point().display()
            )));
        }
        let available_bytes = disk.available_space().min(total_bytes);
        let used_bytes = total_bytes - available_bytes;

        Ok(DiskInfo {
            percent: round_to(used_bytes as f64 / total_bytes as f64 * 100.0, 1),
            free_gb: round_to(available_bytes as f64 / BYTES_PER_GB, 2),
        })
    }

    fn collect_network_info(&mut self) -> NetworkInfo {
        self.networks.refresh();

        let (sent, received) = self
            .networks
            .iter()
            .fold((0u64, 0u64), |(sent, received), (_, data)| {
                (
                    sent.saturating_add(data.total_transmitted()),
                    received.saturating_add(data.total_received()),
                )
            });

        NetworkInfo {
            bytes_sent_mb: round_to(sent as f64 / BYTES_PER_MB, 2),
            bytes_recv_mb: round_to(received as f64 / BYTES_PER_MB, 2),
        }
    }

    /// Current local time, never earlier than the previous snapshot's.
    fn next_timestamp(&mut self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        let timestamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }
}

impl Default for SystemCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SystemCollector {
    async fn collect(&mut self) -> Result<SystemSnapshot> {
        let cpu = self.sample_cpu().await?;
        let memory = self.collect_memory_info()?;
        let disk = self.collect_disk_info()?;
        let network = self.collect_network_info();

        Ok(SystemSnapshot {
            timestamp: self.next_timestamp(),
            cpu,
            memory,
            disk,
            network,
        })
    }
}

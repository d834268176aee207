//! Data structures for system metrics.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Layout used for every human-facing timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A point-in-time bundle of host metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Local wall-clock time when this snapshot was taken
    pub timestamp: NaiveDateTime,
    /// CPU usage
    pub cpu: CpuInfo,
    /// Memory usage
    pub memory: MemoryInfo,
    /// Usage of the monitored filesystem
    pub disk: DiskInfo,
    /// Cumulative network traffic
    pub network: NetworkInfo,
}

/// CPU usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    /// CPU usage percentage (0.0 to 100.0)
    pub usage_percent: f64,
}

/// Memory usage information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Used / total, as a percentage (0.0 to 100.0)
    pub percent: f64,
    /// Used memory in GiB
    pub used_gb: f64,
    /// Available memory in GiB
    pub available_gb: f64,
}

/// Filesystem usage for the configured root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskInfo {
    /// Usage percentage (0.0 to 100.0)
    pub percent: f64,
    /// Free space in GiB
    pub free_gb: f64,
}

/// Network traffic summed over all interfaces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Bytes sent, in MiB
    pub bytes_sent_mb: f64,
    /// Bytes received, in MiB
    pub bytes_recv_mb: f64,
}

impl SystemSnapshot {
    /// Create an empty snapshot stamped with `timestamp`.
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            cpu: CpuInfo::default(),
            memory: MemoryInfo::default(),
            disk: DiskInfo::default(),
            network: NetworkInfo::default(),
        }
    }

    /// Timestamp rendered as `YYYY-MM-DD HH:MM:SS`.
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Whether percentages lie in [0, 100] and byte-derived fields are non-negative.
    pub fn is_within_bounds(&self) -> bool {
        let percent = |v: f64| (0.0..=100.0).contains(&v);
        let amount = |v: f64| v.is_finite() && v >= 0.0;

        percent(self.cpu.usage_percent)
            && percent(self.memory.percent)
            && percent(self.disk.percent)
            && amount(self.memory.used_gb)
            && amount(self.memory.available_gb)
            && amount(self.disk.free_gb)
            && amount(self.network.bytes_sent_mb)
            && amount(self.network.bytes_recv_mb)
    }

    /// Fixed-layout, multi-line summary for operators.
    pub fn summary(&self) -> String {
        format!(
            "System Metrics ({})\n\
             \x20 CPU:     {:.1}%\n\
             \x20 Memory:  {:.1}% ({:.2} GB used, {:.2} GB available)\n\
             \x20 Disk:    {:.1}% used ({:.2} GB free)\n\
             \x20 Network: {:.2} MB sent, {:.2} MB received",
            self.formatted_timestamp(),
            self.cpu.usage_percent,
            self.memory.percent,
            self.memory.used_gb,
            self.memory.available_gb,
            self.disk.percent,
            self.disk.free_gb,
            self.network.bytes_sent_mb,
            self.network.bytes_recv_mb,
        )
    }

    /// Self-contained text block appended to a flat metrics store.
    pub fn flat_record(&self) -> String {
        format!(
            "{sep}\n\
             Timestamp: {}\n\
             CPU Usage: {:.1}%\n\
             Memory Usage: {:.1}% (Used: {:.2} GB, Available: {:.2} GB)\n\
             Disk Usage: {:.1}% (Free: {:.2} GB)\n\
             Network: Sent {:.2} MB, Received {:.2} MB\n",
            self.formatted_timestamp(),
            self.cpu.usage_percent,
            self.memory.percent,
            self.memory.used_gb,
            self.memory.available_gb,
            self.disk.percent,
            self.disk.free_gb,
            self.network.bytes_sent_mb,
            self.network.bytes_recv_mb,
            sep = FLAT_RECORD_SEPARATOR,
        )
    }
}

/// Delimiter line opening every flat record.
pub const FLAT_RECORD_SEPARATOR: &str =
    "==================================================";

/// Round `value` to `places` decimal places.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> SystemSnapshot {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 5)
            .unwrap();
        let mut snapshot = SystemSnapshot::new(ts);
        snapshot.cpu.usage_percent = 12.5;
        snapshot.memory = MemoryInfo {
            percent: 40.0,
            used_gb: 6.4,
            available_gb: 9.6,
        };
        snapshot.disk = DiskInfo {
            percent: 55.5,
            free_gb: 120.25,
        };
        snapshot.network = NetworkInfo {
            bytes_sent_mb: 10.5,
            bytes_recv_mb: 99.75,
        };
        snapshot
    }

    #[test]
    fn test_summary_layout() {
        let summary = sample().summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "System Metrics (2024-03-01 09:00:05)");
        assert_eq!(lines[1], "  CPU:     12.5%");
        assert_eq!(lines[2], "  Memory:  40.0% (6.40 GB used, 9.60 GB available)");
        assert_eq!(lines[3], "  Disk:    55.5% used (120.25 GB free)");
        assert_eq!(lines[4], "  Network: 10.50 MB sent, 99.75 MB received");
    }

    #[test]
    fn test_flat_record_is_delimited() {
        let record = sample().flat_record();
        assert!(record.starts_with(FLAT_RECORD_SEPARATOR));
        assert!(record.ends_with('\n'));
        assert!(record.contains("Timestamp: 2024-03-01 09:00:05"));
        assert!(record.contains("CPU Usage: 12.5%"));
    }

    #[test]
    fn test_bounds() {
        let mut snapshot = sample();
        assert!(snapshot.is_within_bounds());

        snapshot.disk.percent = 100.1;
        assert!(!snapshot.is_within_bounds());

        snapshot.disk.percent = 50.0;
        snapshot.network.bytes_recv_mb = -1.0;
        assert!(!snapshot.is_within_bounds());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.345, 1), 12.3);
        assert_eq!(round_to(12.346, 2), 12.35);
        assert_eq!(round_to(0.0, 2), 0.0);
    }
}

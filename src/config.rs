//! Runtime configuration.
//!
//! Every path and schedule setting lives in [`Config`], which is handed to the
//! workflow and scheduler when they are built. Defaults mirror a checkout with
//! a `data/` directory next to the binary; a TOML file may override any subset.

use crate::error::{Result, SystemError};
use crate::metrics::MetricsFormat;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Format of a trigger time.
pub const TRIGGER_TIME_FORMAT: &str = "%H:%M";

/// Configuration for the commit workflow and scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the git working tree
    pub repo_path: PathBuf,
    /// Commit-log file, relative to `repo_path`
    pub log_file: PathBuf,
    /// Metrics store, relative to `repo_path`; never committed
    pub metrics_file: PathBuf,
    /// Representation used for the metrics store
    pub format: MetricsFormat,
    /// Daily trigger times as `HH:MM`
    pub trigger_times: Vec<String>,
    /// Seconds between scheduler polls
    pub poll_interval_secs: u64,
    /// Remote to sync with and push to
    pub remote: String,
    /// Branch to sync with and push to
    pub branch: String,
    /// Filesystem whose usage is reported
    pub disk_root: PathBuf,
    /// Minimum CPU sampling window in milliseconds
    pub sample_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            log_file: PathBuf::from("data/daily_log.txt"),
            metrics_file: PathBuf::from("data/system_metrics.json"),
            format: MetricsFormat::Structured,
            trigger_times: vec!["09:00".to_string(), "14:00".to_string(), "20:00".to_string()],
            poll_interval_secs: crate::DEFAULT_POLL_INTERVAL_SECS,
            remote: "origin".to_string(),
            branch: "main".to_string(),
            disk_root: PathBuf::from("/"),
            sample_interval_ms: crate::DEFAULT_SAMPLE_INTERVAL_MS,
        }
    }
}

/// Directory holding the running executable, or `.` if it cannot be determined.
fn default_repo_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// Load a configuration file; keys that are absent keep their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            SystemError::config_error(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&contents).map_err(|e| {
            SystemError::config_error(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Set the repository root.
    pub fn with_repo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_path = path.into();
        self
    }

    /// Set the commit-log file (relative to the repository root).
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Set the metrics store (relative to the repository root).
    pub fn with_metrics_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_file = path.into();
        self
    }

    /// Set the metrics store representation.
    pub fn with_format(mut self, format: MetricsFormat) -> Self {
        self.format = format;
        self
    }

    /// Replace the daily trigger times.
    pub fn with_trigger_times<I, T>(mut self, times: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.trigger_times = times.into_iter().map(Into::into).collect();
        self
    }

    /// Set the scheduler poll interval in seconds.
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Set the remote and branch used for sync and push.
    pub fn with_remote(mut self, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        self.remote = remote.into();
        self.branch = branch.into();
        self
    }

    /// Set the filesystem whose usage is reported.
    pub fn with_disk_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.disk_root = path.into();
        self
    }

    /// Absolute path of the commit-log file.
    pub fn log_path(&self) -> PathBuf {
        self.repo_path.join(&self.log_file)
    }

    /// Absolute path of the metrics store.
    pub fn metrics_path(&self) -> PathBuf {
        self.repo_path.join(&self.metrics_file)
    }

    /// Trigger times parsed and sorted.
    pub fn parsed_trigger_times(&self) -> Result<Vec<NaiveTime>> {
        let mut times = self
            .trigger_times
            .iter()
            .map(|raw| {
                NaiveTime::parse_from_str(raw.trim(), TRIGGER_TIME_FORMAT).map_err(|e| {
                    SystemError::config_error(format!("Invalid trigger time '{}': {}", raw, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        times.sort();
        times.dedup();
        Ok(times)
    }

    /// Check the settings that can be wrong independently of the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.trigger_times.is_empty() {
            return Err(SystemError::config_error("At least one trigger time is required"));
        }
        self.parsed_trigger_times()?;
        if self.poll_interval_secs == 0 {
            return Err(SystemError::config_error("poll_interval_secs must be greater than zero"));
        }
        if self.log_file.as_os_str().is_empty() {
            return Err(SystemError::config_error("log_file must not be empty"));
        }
        Ok(())
    }

    /// Create the parent directories of the commit log and metrics store.
    pub fn ensure_directories(&self) -> Result<()> {
        for path in [self.log_path(), self.metrics_path()] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| SystemError::store_write(parent, e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.log_file, PathBuf::from("data/daily_log.txt"));
        assert_eq!(config.metrics_file, PathBuf::from("data/system_metrics.json"));
        assert_eq!(config.format, MetricsFormat::Structured);
        assert_eq!(config.trigger_times, vec!["09:00", "14:00", "20:00"]);
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.remote, "origin");
        assert_eq!(config.branch, "main");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
repo_path = "/srv/metrics-log"
format = "txt"
trigger_times = ["07:30"]
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.repo_path, PathBuf::from("/srv/metrics-log"));
        assert_eq!(config.format, MetricsFormat::Flat);
        assert_eq!(config.trigger_times, vec!["07:30"]);
        // Other fields should be defaults
        assert_eq!(config.branch, "main");
        assert_eq!(
            config.log_path(),
            PathBuf::from("/srv/metrics-log/data/daily_log.txt")
        );
    }

    #[test]
    fn test_trigger_times_sorted_and_validated() {
        let config = Config::default().with_trigger_times(["20:00", "09:00", "09:00"]);
        let times = config.parsed_trigger_times().unwrap();
        assert_eq!(
            times,
            vec![
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            ]
        );

        let bad = Config::default().with_trigger_times(["25:00"]);
        assert!(matches!(bad.validate(), Err(SystemError::Config(_))));

        let none = Config::default().with_trigger_times(Vec::<String>::new());
        assert!(none.validate().is_err());

        let zero_poll = Config::default().with_poll_interval_secs(0);
        assert!(zero_poll.validate().is_err());
    }

    #[test]
    fn test_load_from_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pulse.toml");
        fs::write(&path, "poll_interval_secs = 5\nremote = \"upstream\"\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.remote, "upstream");

        fs::write(&path, "poll_interval_secs = \"soon\"").unwrap();
        assert!(Config::load_from_path(&path).is_err());
        assert!(Config::load_from_path(&temp.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_ensure_directories() {
        let temp = TempDir::new().unwrap();
        let config = Config::default()
            .with_repo_path(temp.path())
            .with_log_file("logs/daily.txt")
            .with_metrics_file("state/metrics.json");

        config.ensure_directories().unwrap();
        assert!(temp.path().join("logs").is_dir());
        assert!(temp.path().join("state").is_dir());
    }
}

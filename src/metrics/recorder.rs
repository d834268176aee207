//! Persistence of snapshots to the local metrics store.

use crate::error::{Result, SystemError};
use crate::metrics::{data::SystemSnapshot, traits::MetricsSource};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Representation used for the metrics store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsFormat {
    /// JSON array of snapshots, oldest first
    #[default]
    #[serde(alias = "json")]
    Structured,
    /// Appended, delimited text blocks
    #[serde(alias = "txt")]
    Flat,
}

impl MetricsFormat {
    /// Infer the format from a `.json` / `.txt` file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Self::Structured),
            "txt" => Some(Self::Flat),
            _ => None,
        }
    }
}

impl FromStr for MetricsFormat {
    type Err = SystemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "structured" | "json" => Ok(Self::Structured),
            "flat" | "txt" | "text" => Ok(Self::Flat),
            other => Err(SystemError::config_error(format!(
                "Unknown metrics format '{}'; use 'structured' or 'flat'",
                other
            ))),
        }
    }
}

/// Collects snapshots from a [`MetricsSource`] and writes them to a store file.
///
/// The store's parent directory must already exist. Writes are not guarded
/// against concurrent writers.
pub struct MetricsRecorder<S> {
    source: S,
    store_path: PathBuf,
}

impl<S: MetricsSource> MetricsRecorder<S> {
    /// Create a recorder writing to `store_path`.
    pub fn new(source: S, store_path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            store_path: store_path.into(),
        }
    }

    /// Path of the metrics store.
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Collect a snapshot without persisting it.
    pub async fn collect_metrics(&mut self) -> Result<SystemSnapshot> {
        self.source.collect().await
    }

    /// Collect a snapshot, persist it in `format`, and return it.
    pub async fn log_metrics(&mut self, format: MetricsFormat) -> Result<SystemSnapshot> {
        let snapshot = self.collect_metrics().await?;
        self.record(&snapshot, format)?;
        Ok(snapshot)
    }

    /// Collect a fresh snapshot and render its summary.
    pub async fn get_summary(&mut self) -> Result<String> {
        Ok(self.collect_metrics().await?.summary())
    }
}

impl<S> MetricsRecorder<S> {
    /// Persist an already collected snapshot.
    pub fn record(&self, snapshot: &SystemSnapshot, format: MetricsFormat) -> Result<()> {
        match format {
            MetricsFormat::Structured => self.append_structured(snapshot),
            MetricsFormat::Flat => self.append_flat(snapshot),
        }
    }

    /// Snapshots in the structured store, oldest first.
    ///
    /// A missing or unparsable store reads as empty; any other read failure is
    /// a [`SystemError::StoreWrite`] and the store is left as it is.
    pub fn read_history(&self) -> Result<Vec<SystemSnapshot>> {
        let contents = match fs::read_to_string(&self.store_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SystemError::store_write(&self.store_path, e)),
        };

        match serde_json::from_str(&contents) {
            Ok(history) => Ok(history),
            Err(err) => {
                warn!(
                    "Ignoring unparsable metrics store {}: {}",
                    self.store_path.display(),
                    err
                );
                Ok(Vec::new())
            }
        }
    }

    fn append_structured(&self, snapshot: &SystemSnapshot) -> Result<()> {
        let mut history = self.read_history()?;
        history.push(snapshot.clone());

        let json = serde_json::to_string_pretty(&history)?;

        // Write next to the store and rename so a crash never leaves a torn file.
        let tmp_path = self.store_path.with_extension("tmp");
        fs::write(&tmp_path, json).map_err(|e| SystemError::store_write(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.store_path)
            .map_err(|e| SystemError::store_write(&self.store_path, e))?;

        debug!(
            "Stored snapshot {} ({} records) in {}",
            snapshot.formatted_timestamp(),
            history.len(),
            self.store_path.display()
        );
        Ok(())
    }

    fn append_flat(&self, snapshot: &SystemSnapshot) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.store_path)
            .map_err(|e| SystemError::store_write(&self.store_path, e))?;

        writeln!(file, "{}", snapshot.flat_record())
            .map_err(|e| SystemError::store_write(&self.store_path, e))?;

        debug!(
            "Appended snapshot {} to {}",
            snapshot.formatted_timestamp(),
            self.store_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_snapshot, FakeMetricsSource};
    use tempfile::TempDir;

    #[test]
    fn test_format_parsing() {
        assert_eq!("structured".parse::<MetricsFormat>().unwrap(), MetricsFormat::Structured);
        assert_eq!("JSON".parse::<MetricsFormat>().unwrap(), MetricsFormat::Structured);
        assert_eq!("txt".parse::<MetricsFormat>().unwrap(), MetricsFormat::Flat);
        assert!("yaml".parse::<MetricsFormat>().is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            MetricsFormat::from_path(Path::new("data/system_metrics.json")),
            Some(MetricsFormat::Structured)
        );
        assert_eq!(
            MetricsFormat::from_path(Path::new("metrics.txt")),
            Some(MetricsFormat::Flat)
        );
        assert_eq!(MetricsFormat::from_path(Path::new("metrics")), None);
    }

    #[tokio::test]
    async fn test_structured_round_trip() {
        let temp = TempDir::new().unwrap();
        let snapshot = sample_snapshot(9, 10.0, 20.0, 30.0);
        let mut recorder = MetricsRecorder::new(
            FakeMetricsSource::new(vec![snapshot.clone()]),
            temp.path().join("metrics.json"),
        );

        let written = recorder.log_metrics(MetricsFormat::Structured).await.unwrap();
        assert_eq!(written, snapshot);

        let history = recorder.read_history().unwrap();
        assert_eq!(history.last(), Some(&snapshot));
    }

    #[tokio::test]
    async fn test_structured_appends_to_existing_records() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics.json");
        let prior = vec![
            sample_snapshot(7, 1.0, 2.0, 3.0),
            sample_snapshot(8, 4.0, 5.0, 6.0),
        ];
        fs::write(&path, serde_json::to_string(&prior).unwrap()).unwrap();

        let new = sample_snapshot(9, 10.0, 20.0, 30.0);
        let mut recorder = MetricsRecorder::new(FakeMetricsSource::new(vec![new.clone()]), &path);
        recorder.log_metrics(MetricsFormat::Structured).await.unwrap();

        let history = recorder.read_history().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[..2], prior[..]);
        assert_eq!(history[2], new);
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_unparsable_store_starts_over() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics.json");
        fs::write(&path, "not json at all").unwrap();

        let snapshot = sample_snapshot(14, 50.0, 60.0, 70.0);
        let mut recorder =
            MetricsRecorder::new(FakeMetricsSource::new(vec![snapshot.clone()]), &path);
        recorder.log_metrics(MetricsFormat::Structured).await.unwrap();

        assert_eq!(recorder.read_history().unwrap(), vec![snapshot]);
    }

    #[tokio::test]
    async fn test_flat_store_is_only_extended() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics.txt");
        let mut recorder = MetricsRecorder::new(
            FakeMetricsSource::new(vec![
                sample_snapshot(9, 10.0, 20.0, 30.0),
                sample_snapshot(14, 11.0, 21.0, 31.0),
            ]),
            &path,
        );

        recorder.log_metrics(MetricsFormat::Flat).await.unwrap();
        let first = fs::read_to_string(&path).unwrap();
        recorder.log_metrics(MetricsFormat::Flat).await.unwrap();
        let second = fs::read_to_string(&path).unwrap();

        assert!(second.starts_with(&first));
        assert_eq!(second.matches(crate::metrics::data::FLAT_RECORD_SEPARATOR).count(), 2);
        assert!(second.contains("CPU Usage: 11.0%"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_store_write_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("metrics.json");

        for format in [MetricsFormat::Structured, MetricsFormat::Flat] {
            let mut recorder = MetricsRecorder::new(
                FakeMetricsSource::new(vec![sample_snapshot(9, 1.0, 1.0, 1.0)]),
                &path,
            );
            let err = recorder.log_metrics(format).await.unwrap_err();
            assert!(matches!(err, SystemError::StoreWrite { .. }), "got {err:?}");
        }
        assert!(!temp.path().join("missing").exists());
    }

    #[tokio::test]
    async fn test_unreadable_store_is_not_overwritten() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "history").unwrap();

        let mut recorder = MetricsRecorder::new(
            FakeMetricsSource::new(vec![sample_snapshot(9, 1.0, 1.0, 1.0)]),
            &path,
        );
        assert!(matches!(
            recorder.read_history(),
            Err(SystemError::StoreWrite { .. })
        ));

        let err = recorder.log_metrics(MetricsFormat::Structured).await.unwrap_err();
        assert!(matches!(err, SystemError::StoreWrite { .. }), "got {err:?}");
        assert!(path.join("keep").exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_source_failure_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics.json");
        let mut recorder = MetricsRecorder::new(FakeMetricsSource::failing(), &path);

        let err = recorder.log_metrics(MetricsFormat::Structured).await.unwrap_err();
        assert!(matches!(err, SystemError::MetricsUnavailable(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_summary_is_structurally_stable() {
        let temp = TempDir::new().unwrap();
        let mut recorder = MetricsRecorder::new(
            FakeMetricsSource::new(vec![
                sample_snapshot(9, 10.0, 20.0, 30.0),
                sample_snapshot(9, 10.5, 20.1, 30.0),
            ]),
            temp.path().join("metrics.json"),
        );

        let first = recorder.get_summary().await.unwrap();
        let second = recorder.get_summary().await.unwrap();

        let labels = |s: &str| -> Vec<String> {
            s.lines()
                .map(|line| line.split(':').next().unwrap_or_default().to_string())
                .collect()
        };
        assert_eq!(labels(&first), labels(&second));
        assert!(!temp.path().join("metrics.json").exists());
    }
}

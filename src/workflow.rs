//! The commit cycle: sample, log, sync, commit, push.
//!
//! A cycle walks a fixed sequence of [`CycleState`]s. Any error stops the
//! cycle where it is, moves it to [`CycleState::Failed`] and is reported, but
//! never propagates: the next scheduled run is the retry. Side effects that
//! already happened (metrics stored, log line appended) are not rolled back, so
//! the commit log can run ahead of the last successful push.

use crate::config::Config;
use crate::error::{Result, SystemError};
use crate::metrics::{
    data::TIMESTAMP_FORMAT, MetricsFormat, MetricsRecorder, MetricsSource, SystemSnapshot,
};
use crate::vcs::{CommandRunner, GitClient};
use chrono::{Local, NaiveDateTime, Timelike};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Coarse part-of-day label derived from the clock hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeContext {
    /// 05:00 to 11:59
    Morning,
    /// 12:00 to 16:59
    Afternoon,
    /// 17:00 to 04:59
    Evening,
}

impl TimeContext {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeContext::Morning,
            12..=16 => TimeContext::Afternoon,
            _ => TimeContext::Evening,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeContext::Morning => "Morning",
            TimeContext::Afternoon => "Afternoon",
            TimeContext::Evening => "Evening",
        }
    }
}

impl fmt::Display for TimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One line of the commit log; also the source of the commit message.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub context: TimeContext,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub timestamp: NaiveDateTime,
}

impl LogEntry {
    pub fn new(context: TimeContext, snapshot: &SystemSnapshot, timestamp: NaiveDateTime) -> Self {
        Self {
            context,
            cpu_percent: snapshot.cpu.usage_percent,
            memory_percent: snapshot.memory.percent,
            disk_percent: snapshot.disk.percent,
            timestamp,
        }
    }

    /// The log line without its trailing timestamp.
    pub fn commit_message(&self) -> String {
        format!(
            "{}: CPU {:.1}% | Memory {:.1}% | Disk {:.1}% used",
            self.context, self.cpu_percent, self.memory_percent, self.disk_percent
        )
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.commit_message(), self.formatted_timestamp())
    }
}

/// Progress of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    TimeContextResolved,
    MetricsCollected,
    LocalLogAppended,
    RemoteSynced,
    Committed,
    Pushed,
    Failed,
}

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The log line was committed and pushed
    Pushed { entry: LogEntry },
    /// The cycle stopped after reaching `reached`
    Failed {
        reached: CycleState,
        error: SystemError,
    },
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Pushed { .. })
    }
}

/// Runs commit cycles against one repository.
pub struct CommitWorkflow<S, R> {
    recorder: MetricsRecorder<S>,
    git: GitClient<R>,
    log_file: PathBuf,
    log_path: PathBuf,
    format: MetricsFormat,
    state: CycleState,
    last_logged: Option<NaiveDateTime>,
}

impl<S: MetricsSource, R: CommandRunner> CommitWorkflow<S, R> {
    pub fn new(config: &Config, source: S, runner: R) -> Self {
        Self {
            recorder: MetricsRecorder::new(source, config.metrics_path()),
            git: GitClient::new(
                runner,
                config.repo_path.clone(),
                config.remote.clone(),
                config.branch.clone(),
            ),
            log_file: config.log_file.clone(),
            log_path: config.log_path(),
            format: config.format,
            state: CycleState::Idle,
            last_logged: None,
        }
    }

    /// Current state; `Failed` after a failed cycle until the next one starts.
    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn recorder_mut(&mut self) -> &mut MetricsRecorder<S> {
        &mut self.recorder
    }

    /// Run one cycle stamped with the current local time.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.run_cycle_at(Local::now().naive_local()).await
    }

    /// Run one cycle stamped with `now`. Errors are reported, never returned.
    ///
    /// A `now` earlier than the last logged line is raised to it, so log
    /// timestamps never go backwards.
    pub async fn run_cycle_at(&mut self, now: NaiveDateTime) -> CycleOutcome {
        self.state = CycleState::Idle;
        let now = match self.last_logged {
            Some(last) if last > now => last,
            _ => now,
        };

        match self.try_cycle(now).await {
            Ok(entry) => {
                self.state = CycleState::Idle;
                println!(
                    "✓ Successfully committed and pushed at {}",
                    entry.formatted_timestamp()
                );
                info!("Cycle complete: {}", entry);
                CycleOutcome::Pushed { entry }
            }
            Err(err) => {
                let reached = self.state;
                self.state = CycleState::Failed;
                match err {
                    SystemError::VersionControl { .. } => println!("✗ Git error: {}", err),
                    _ => println!("✗ Error: {}", err),
                }
                error!("Cycle failed after {:?}: {}", reached, err);
                CycleOutcome::Failed {
                    reached,
                    error: err,
                }
            }
        }
    }

    async fn try_cycle(&mut self, now: NaiveDateTime) -> Result<LogEntry> {
        let context = TimeContext::from_hour(now.hour());
        self.advance(CycleState::TimeContextResolved);

        let snapshot = self.recorder.log_metrics(self.format).await?;
        self.advance(CycleState::MetricsCollected);
        println!("{}", snapshot.summary());

        let entry = LogEntry::new(context, &snapshot, now);
        self.append_log(&entry)?;
        self.last_logged = Some(entry.timestamp);
        self.advance(CycleState::LocalLogAppended);

        self.git.sync().await?;
        self.advance(CycleState::RemoteSynced);

        // Only the commit log is tracked; the metrics store stays local.
        self.git.stage(&self.log_file).await?;
        self.git.commit(&entry.commit_message()).await?;
        self.advance(CycleState::Committed);

        self.git.push().await?;
        self.advance(CycleState::Pushed);

        Ok(entry)
    }

    fn append_log(&self, entry: &LogEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| SystemError::store_write(&self.log_path, e))?;

        writeln!(file, "{}", entry).map_err(|e| SystemError::store_write(&self.log_path, e))
    }

    fn advance(&mut self, next: CycleState) {
        debug!("Cycle state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

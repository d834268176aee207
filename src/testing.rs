//! Scripted stand-ins for the metrics source and command runner.
//!
//! These let the workflow and scheduler run end to end without touching the
//! OS counters, git, or the network.

use crate::error::{Result, SystemError};
use crate::metrics::{
    data::{CpuInfo, DiskInfo, MemoryInfo, NetworkInfo, SystemSnapshot},
    traits::MetricsSource,
};
use crate::vcs::{CommandOutput, CommandRunner};
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Snapshot taken on 2024-01-15 at `hour`:00:00 with the given headline percentages.
pub fn sample_snapshot(hour: u32, cpu: f64, memory: f64, disk: f64) -> SystemSnapshot {
    let timestamp = NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap_or_default();

    SystemSnapshot {
        timestamp,
        cpu: CpuInfo { usage_percent: cpu },
        memory: MemoryInfo {
            percent: memory,
            used_gb: 3.2,
            available_gb: 12.8,
        },
        disk: DiskInfo {
            percent: disk,
            free_gb: 100.5,
        },
        network: NetworkInfo {
            bytes_sent_mb: 12.34,
            bytes_recv_mb: 56.78,
        },
    }
}

/// [`MetricsSource`] that replays a fixed list of snapshots.
///
/// Once the script runs out the last snapshot is repeated; a source built with
/// [`FakeMetricsSource::failing`] always reports the metrics as unavailable.
#[derive(Debug, Default)]
pub struct FakeMetricsSource {
    script: VecDeque<SystemSnapshot>,
    last: Option<SystemSnapshot>,
    failing: bool,
}

impl FakeMetricsSource {
    pub fn new(script: Vec<SystemSnapshot>) -> Self {
        Self {
            script: script.into(),
            last: None,
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }
}

impl MetricsSource for FakeMetricsSource {
    async fn collect(&mut self) -> Result<SystemSnapshot> {
        if self.failing {
            return Err(SystemError::metrics_unavailable("scripted sensor failure"));
        }
        if let Some(next) = self.script.pop_front() {
            self.last = Some(next);
        }
        self.last
            .clone()
            .ok_or_else(|| SystemError::metrics_unavailable("empty metrics script"))
    }
}

/// One recorded call to a [`ScriptedRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// [`CommandRunner`] that records every call and succeeds unless told otherwise.
///
/// Clones share the same log, so a test can keep one handle while the
/// workflow owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    calls: Arc<Mutex<Vec<Invocation>>>,
    failures: Vec<(String, CommandOutput)>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `output` whenever the first argument equals `subcommand`.
    pub fn fail_on(mut self, subcommand: &str, output: CommandOutput) -> Self {
        self.failures.push((subcommand.to_string(), output));
        self
    }

    /// Calls made so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Subcommands (first arguments) made so far, in order.
    pub fn subcommands(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .filter_map(|call| call.args.into_iter().next())
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Invocation {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
                cwd: cwd.to_path_buf(),
            });
        }

        let scripted = args.first().and_then(|sub| {
            self.failures
                .iter()
                .find(|(name, _)| name == sub)
                .map(|(_, output)| output.clone())
        });
        Ok(scripted.unwrap_or_else(CommandOutput::ok))
    }
}

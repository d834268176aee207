//! Daily trigger times and the polling loop that drives the workflow.

use crate::config::Config;
use crate::error::{Result, SystemError};
use crate::metrics::MetricsSource;
use crate::vcs::CommandRunner;
use crate::workflow::CommitWorkflow;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// One daily trigger and when it next fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub at: NaiveTime,
    pub next_run: NaiveDateTime,
}

/// First occurrence of `at` strictly after `after`.
fn next_occurrence(at: NaiveTime, after: NaiveDateTime) -> NaiveDateTime {
    let today = after.date().and_time(at);
    if today > after {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Runs a [`CommitWorkflow`] at fixed times of day.
///
/// Cycles run one at a time on the caller's task. Firings missed while a
/// cycle was running, or while the process was down, are not replayed.
pub struct Scheduler<S, R> {
    workflow: CommitWorkflow<S, R>,
    jobs: Vec<ScheduledJob>,
    poll_interval: Duration,
}

impl<S: MetricsSource, R: CommandRunner> Scheduler<S, R> {
    /// Register `workflow` against the trigger times in `config`.
    pub fn new(config: &Config, workflow: CommitWorkflow<S, R>) -> Result<Self> {
        Self::starting_at(config, workflow, Local::now().naive_local())
    }

    /// Like [`Scheduler::new`], computing first firings relative to `now`.
    pub fn starting_at(
        config: &Config,
        workflow: CommitWorkflow<S, R>,
        now: NaiveDateTime,
    ) -> Result<Self> {
        config.validate()?;
        let jobs = config
            .parsed_trigger_times()?
            .into_iter()
            .map(|at| ScheduledJob {
                at,
                next_run: next_occurrence(at, now),
            })
            .collect::<Vec<_>>();

        if jobs.is_empty() {
            return Err(SystemError::config_error("No trigger times configured"));
        }

        Ok(Self {
            workflow,
            jobs,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        })
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Earliest pending firing.
    pub fn next_run(&self) -> Option<NaiveDateTime> {
        self.jobs.iter().map(|job| job.next_run).min()
    }

    pub fn workflow(&self) -> &CommitWorkflow<S, R> {
        &self.workflow
    }

    /// Run every job due at `now`, in firing order, and return how many ran.
    pub async fn run_pending(&mut self, now: NaiveDateTime) -> usize {
        let mut due: Vec<usize> = (0..self.jobs.len())
            .filter(|&i| self.jobs[i].next_run <= now)
            .collect();
        due.sort_by_key(|&i| self.jobs[i].next_run);

        for &i in &due {
            info!("Trigger {} fired", self.jobs[i].at.format("%H:%M"));
            self.workflow.run_cycle().await;
            self.jobs[i].next_run = next_occurrence(self.jobs[i].at, now);
            debug!("Next run for {} at {}", self.jobs[i].at, self.jobs[i].next_run);
        }

        due.len()
    }

    /// Run once immediately, then poll until `shutdown` completes.
    ///
    /// `shutdown` is only observed between polls; a cycle that has started
    /// always runs to completion or failure.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let times = self
            .jobs
            .iter()
            .map(|job| job.at.format("%H:%M").to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("Daily commit automation started!");
        println!("Scheduled to run at: {}", times);
        println!("Press Ctrl+C to stop\n");

        println!("Running initial commit now...");
        self.workflow.run_cycle().await;

        if let Some(next) = self.next_run() {
            info!("Next scheduled run at {}", next);
        }

        tokio::pin!(shutdown);
        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, leaving scheduler loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_pending(Local::now().naive_local()).await;
                }
            }
        }

        println!("\n\nAutomation stopped by user.");
    }
}

/// Completes on SIGINT, or SIGTERM on unix.
///
/// The listener task is spawned immediately so the signal handlers are in
/// place before the first cycle starts.
pub fn shutdown_signal() -> impl Future<Output = ()> {
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C)");
            }
            _ = terminate => {
                info!("Received SIGTERM");
            }
        }

        let _ = tx.send(());
    });

    async move {
        let _ = rx.await;
    }
}

//! # pulse_commit - Host Metrics Commit Log
//!
//! Samples host resource utilization (CPU, memory, disk, network) a few times a
//! day, appends a one-line summary to a commit-log file, and commits and pushes
//! that file to a remote git repository.
//!
//! ## Features
//!
//! - **Metrics collection**: CPU, memory, disk and network counters via `sysinfo`
//! - **Dual-format store**: structured JSON history or flat human-readable text
//! - **Commit workflow**: log, sync (`pull --rebase`), commit, push, with every
//!   failure reported and contained to its cycle
//! - **Scheduler**: fixed daily trigger times with an immediate first run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pulse_commit::{
//!     shutdown_signal, CommitWorkflow, Config, Scheduler, SystemCollector, SystemCommandRunner,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default().with_repo_path("/srv/metrics-log");
//!     config.ensure_directories()?;
//!
//!     let workflow = CommitWorkflow::new(
//!         &config,
//!         SystemCollector::from_config(&config),
//!         SystemCommandRunner,
//!     );
//!     let mut scheduler = Scheduler::new(&config, workflow)?;
//!     scheduler.run_until(shutdown_signal()).await;
//!     Ok(())
//! }
//! ```
//!
//! Only one instance may run against a given working tree; nothing guards
//! against two processes appending and committing concurrently.

pub mod config;
pub mod error;
pub mod metrics;
pub mod scheduler;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod vcs;
pub mod workflow;

// Re-export public API
pub use config::Config;
pub use error::{Result, SystemError, VcsStep};
pub use metrics::{
    collector::SystemCollector,
    data::{CpuInfo, DiskInfo, MemoryInfo, NetworkInfo, SystemSnapshot},
    recorder::{MetricsFormat, MetricsRecorder},
    traits::MetricsSource,
};
pub use scheduler::{shutdown_signal, Scheduler};
pub use vcs::{CommandOutput, CommandRunner, GitClient, SystemCommandRunner};
pub use workflow::{CommitWorkflow, CycleOutcome, CycleState, LogEntry, TimeContext};

/// The default scheduler poll interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// The default CPU sampling window in milliseconds
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 200;

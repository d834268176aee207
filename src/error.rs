//! Error handling for the pulse_commit crate.

use std::fmt;
use std::path::PathBuf;

/// A specialized `Result` type for pulse_commit operations.
pub type Result<T> = std::result::Result<T, SystemError>;

/// The version-control step that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsStep {
    /// `git pull --rebase` against the configured remote
    Sync,
    /// `git add` of the commit-log file
    Stage,
    /// `git commit`
    Commit,
    /// `git push`
    Push,
}

impl fmt::Display for VcsStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VcsStep::Sync => "sync",
            VcsStep::Stage => "stage",
            VcsStep::Commit => "commit",
            VcsStep::Push => "push",
        };
        f.write_str(name)
    }
}

/// The main error type for pulse_commit operations.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// An OS counter could not be read
    #[error("Metrics unavailable: {0}")]
    MetricsUnavailable(String),

    /// Local persistence (metrics store or commit log) failed
    #[error("Failed to write {}: {source}", path.display())]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A git operation exited unsuccessfully
    #[error("Git {step} failed: {message}")]
    VersionControl { step: VcsStep, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything that fits no other category
    #[error("Error: {0}")]
    Unclassified(String),
}

impl SystemError {
    /// Create a new metrics-unavailable error
    pub fn metrics_unavailable(msg: impl Into<String>) -> Self {
        Self::MetricsUnavailable(msg.into())
    }

    /// Create a new store write error for `path`
    pub fn store_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a new version-control error for the given step
    pub fn vcs_error(step: VcsStep, msg: impl Into<String>) -> Self {
        Self::VersionControl {
            step,
            message: msg.into(),
        }
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new catch-all error
    pub fn unclassified(msg: impl Into<String>) -> Self {
        Self::Unclassified(msg.into())
    }

    /// The failed git step, if this is a version-control error.
    pub fn vcs_step(&self) -> Option<VcsStep> {
        match self {
            Self::VersionControl { step, .. } => Some(*step),
            _ => None,
        }
    }
}

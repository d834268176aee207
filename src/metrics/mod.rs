//! System metrics collection and persistence.
//!
//! This module samples CPU, memory, disk and network counters into a
//! [`SystemSnapshot`] and records snapshots to the local metrics store in
//! either a structured (JSON) or flat (text) representation.

pub mod collector;
pub mod data;
pub mod recorder;
pub mod traits;

// Re-export commonly used items
pub use collector::SystemCollector;
pub use data::SystemSnapshot;
pub use recorder::{MetricsFormat, MetricsRecorder};
pub use traits::MetricsSource;

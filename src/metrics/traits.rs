//! Traits for system metrics collection.

use crate::error::Result;
use crate::metrics::data::SystemSnapshot;

/// A source of host metrics snapshots.
///
/// Implementations either return a complete snapshot or fail with
/// [`SystemError::MetricsUnavailable`](crate::error::SystemError::MetricsUnavailable);
/// a snapshot with some sub-metrics missing is never produced. A call may wait
/// for a short, bounded sampling interval but must not block beyond it.
pub trait MetricsSource {
    /// Collect a single snapshot of system metrics.
    fn collect(&mut self) -> impl std::future::Future<Output = Result<SystemSnapshot>> + Send;
}

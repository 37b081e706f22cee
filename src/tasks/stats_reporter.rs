//! Stats Reporter Task
//!
//! Background task that closes a hit/miss window on a fixed interval and
//! hands the resulting snapshot to a sink.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheStats, CacheStore, StatsSnapshot};

// == Stats Sink ==
/// Destination for per-window snapshots.
///
/// Implemented for any `Fn(&StatsSnapshot)` closure, so tests and callers
/// can collect or export snapshots without a dedicated type.
pub trait StatsSink: Send + Sync + 'static {
    fn emit(&self, snapshot: &StatsSnapshot);
}

impl<F> StatsSink for F
where
    F: Fn(&StatsSnapshot) + Send + Sync + 'static,
{
    fn emit(&self, snapshot: &StatsSnapshot) {
        self(snapshot)
    }
}

/// Default sink: one structured `info!` event per window.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatsSink for TracingSink {
    fn emit(&self, snapshot: &StatsSnapshot) {
        info!(
            cache = %snapshot.name,
            total_ops = snapshot.total_ops,
            hit_ratio = snapshot.hit_ratio,
            size = snapshot.size,
            hits = snapshot.hits,
            misses = snapshot.misses,
            "cache({}) - ops: {}, hit_ratio: {:.1}%, elements: {}, hit: {}, miss: {}",
            snapshot.name,
            snapshot.total_ops,
            snapshot.hit_percent(),
            snapshot.size,
            snapshot.hits,
            snapshot.misses
        );
    }
}

// == Reporter Handle ==
/// Owns the reporter task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct ReporterHandle {
    task: JoinHandle<()>,
}

impl ReporterHandle {
    /// Stops the reporter. Counts in the open window are not emitted.
    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns the periodic stats reporter.
///
/// Every `interval` the task swaps the hit/miss counters to zero, skips the
/// window if it saw no traffic, and otherwise reads the store size and emits
/// a `StatsSnapshot` to `sink`.
///
/// Must be called from within a tokio runtime.
///
/// # Example
/// ```ignore
/// let interval = Duration::from_secs(60);
/// let handle = spawn_stats_reporter(name, stats, store, interval, Arc::new(TracingSink));
/// // Later, when the cache is discarded:
/// handle.stop();
/// ```
pub fn spawn_stats_reporter<K, V>(
    name: Arc<str>,
    stats: Arc<CacheStats>,
    store: Arc<RwLock<CacheStore<K, V>>>,
    interval: Duration,
    sink: Arc<dyn StatsSink>,
) -> ReporterHandle
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let task = tokio::spawn(async move {
        info!(cache = %name, interval_ms = interval.as_millis() as u64, "Starting stats reporter");

        loop {
            tokio::time::sleep(interval).await;

            let (hits, misses) = stats.take_window();
            if hits + misses == 0 {
                debug!(cache = %name, "Stats reporter: idle window");
                continue;
            }

            let size = store.read().await.len();
            if let Some(snapshot) = StatsSnapshot::from_window(&name, hits, misses, size) {
                sink.emit(&snapshot);
            }
        }
    });

    ReporterHandle { task }
}

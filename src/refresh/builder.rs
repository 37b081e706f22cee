//! Cache Builder
//!
//! Fluent construction of a `StampedeCache` on top of `CacheOptions`.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheOptions;
use crate::refresh::StampedeCache;
use crate::tasks::{StatsSink, TracingSink};

/// Builder for [`StampedeCache`].
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use stampede_cache::{CacheBuilder, StampedeCache};
///
/// # async fn demo() {
/// let cache: StampedeCache<String, String> = CacheBuilder::new()
///     .with_name("profiles")
///     .with_capacity(10_000)
///     .with_ttl(Duration::from_secs(30))
///     .build();
/// # }
/// ```
pub struct CacheBuilder {
    options: CacheOptions,
    sink: Arc<dyn StatsSink>,
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::from_options(CacheOptions::default())
    }
}

impl CacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from existing options, e.g. `CacheOptions::from_env()`.
    pub fn from_options(options: CacheOptions) -> Self {
        Self {
            options,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.options.ttl = ttl;
        self
    }

    /// Maximum number of entries; 0 means unbounded.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.options.capacity = capacity;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    /// Length of each stats window; `Duration::ZERO` disables the reporter.
    pub fn with_stat_interval(mut self, interval: Duration) -> Self {
        self.options.stat_interval = interval;
        self
    }

    /// Where stats snapshots go. Defaults to [`TracingSink`].
    pub fn with_sink(mut self, sink: impl StatsSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Builds the cache and starts its stats reporter.
    ///
    /// The reporter needs a tokio runtime; outside one it is skipped with a
    /// warning.
    pub fn build<K, V>(self) -> StampedeCache<K, V>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        StampedeCache::from_parts(self.options, self.sink)
    }
}

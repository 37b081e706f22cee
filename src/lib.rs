//! Stampede Cache - An in-process LRU + TTL cache with single-flight refresh
//!
//! Wraps an expensive data source behind a bounded local cache. Concurrent
//! misses for the same key share one refresh, failed refreshes fall back to
//! the last known value, and a background task reports windowed hit/miss
//! statistics.

pub mod cache;
pub mod config;
pub mod error;
pub mod refresh;
pub mod tasks;

pub use cache::{CacheStats, CacheStore, Lookup, StatsSnapshot};
pub use config::CacheOptions;
pub use error::{CacheError, RefreshFailure};
pub use refresh::{CacheBuilder, StampedeCache};
pub use tasks::{StatsSink, TracingSink};

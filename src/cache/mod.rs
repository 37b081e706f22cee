//! Cache Module
//!
//! In-memory LRU storage with TTL expiration, plus the hit/miss counters
//! that observe it.

mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::{Keys, LruList};
pub use stats::{CacheStats, StatsSnapshot};
pub use store::{CacheStore, Lookup};

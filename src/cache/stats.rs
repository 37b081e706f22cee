//! Cache Statistics Module
//!
//! Windowed hit/miss counters and the snapshot emitted for each window.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Cache Stats ==
/// Lock-free hit/miss counters shared between the cache and its reporter.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups served fresh from the store
    hits: AtomicU64,
    /// Lookups that went through the refresh path or found nothing
    misses: AtomicU64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Current hit count for the open window.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Current miss count for the open window.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    // == Take Window ==
    /// Reads and zeroes both counters, returning `(hits, misses)`.
    ///
    /// Each counter is swapped atomically, so no increment is lost or
    /// counted twice across windows.
    pub fn take_window(&self) -> (u64, u64) {
        let hits = self.hits.swap(0, Ordering::AcqRel);
        let misses = self.misses.swap(0, Ordering::AcqRel);
        (hits, misses)
    }
}

// == Stats Snapshot ==
/// Summary of one reporting window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Cache name the snapshot belongs to
    pub name: String,
    /// hits + misses during the window
    pub total_ops: u64,
    /// hits / total_ops, in [0.0, 1.0]
    pub hit_ratio: f64,
    /// Entry count at emission time, expired entries included
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    /// When the window was closed
    pub emitted_at: DateTime<Utc>,
}

impl StatsSnapshot {
    /// Builds a snapshot for a closed window.
    ///
    /// Returns `None` for an idle window (no hits and no misses).
    pub fn from_window(name: &str, hits: u64, misses: u64, size: usize) -> Option<Self> {
        let total_ops = hits + misses;
        if total_ops == 0 {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            total_ops,
            hit_ratio: hits as f64 / total_ops as f64,
            size,
            hits,
            misses,
            emitted_at: Utc::now(),
        })
    }

    /// Hit ratio as a percentage.
    pub fn hit_percent(&self) -> f64 {
        self.hit_ratio * 100.0
    }
}

//! Cache Entry Module
//!
//! Defines the value stored per key together with its expiry deadline.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// A stored value and the instant after which it is considered stale.
///
/// Uses the tokio clock so expiry follows `tokio::time::pause`/`advance`
/// in tests.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Instant at which the entry expires
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry that expires `ttl` from now.
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: deadline(ttl),
        }
    }

    // == Replace ==
    /// Replaces the value in place and restarts the TTL.
    pub fn replace(&mut self, value: V, ttl: Duration) {
        self.value = value;
        self.expires_at = deadline(ttl);
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired once the current time is
    /// greater than or equal to its deadline.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Checks expiry against a caller-supplied instant.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or `Duration::ZERO` once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Computes `now + ttl`, clamping TTLs too large for the clock.
fn deadline(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365 * 30))
}

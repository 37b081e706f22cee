//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache lookups and refreshes.
///
/// `Clone` so a single refresh outcome can be handed to every waiter that
/// joined the same in-flight computation.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Key not present in the store
    #[error("key not found")]
    NotFound,

    /// Key present but its TTL has elapsed
    #[error("key expired")]
    Expired,

    /// The caller-supplied refresh returned an error
    #[error("refresh failed: {0:#}")]
    RefreshFailed(Arc<anyhow::Error>),

    /// The refresh task panicked or was cancelled before producing a value
    #[error("refresh aborted: {0}")]
    RefreshAborted(String),
}

impl CacheError {
    /// Wraps an error returned by a refresh callback.
    pub fn refresh_failed(err: impl Into<anyhow::Error>) -> Self {
        CacheError::RefreshFailed(Arc::new(err.into()))
    }
}

// == Refresh Failure ==
/// Result of a failed `get_or_refresh`.
///
/// Carries the last known value for the key, if there was one, so callers can
/// degrade to stale data instead of failing outright.
#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct RefreshFailure<V> {
    /// Last value held by the cache for this key, even if expired
    pub stale: Option<V>,
    /// Why the refresh did not produce a value
    #[source]
    pub error: CacheError,
}

impl<V> RefreshFailure<V> {
    pub fn new(stale: Option<V>, error: CacheError) -> Self {
        Self { stale, error }
    }

    /// Returns the stale fallback value, if any.
    pub fn stale(&self) -> Option<&V> {
        self.stale.as_ref()
    }

    /// Consumes the failure, returning the stale fallback value.
    pub fn into_stale(self) -> Option<V> {
        self.stale
    }
}

// == Result Type Alias ==
/// Convenience Result type for store lookups.
pub type Result<T> = std::result::Result<T, CacheError>;

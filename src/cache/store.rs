//! Cache Store Module
//!
//! Bounded key/value storage combining the LRU list with TTL expiration.
//! Knows nothing about refresh coordination or statistics; callers provide
//! their own locking.

use std::borrow::Borrow;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cache::lru::Keys;
use crate::cache::{CacheEntry, LruList};
use crate::error::{CacheError, Result};

// == Lookup ==
/// Outcome of a successful store lookup.
///
/// Expired entries still hand back their last value so the caller can decide
/// whether stale data is acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Present and within its TTL
    Fresh(V),
    /// Present but past its TTL
    Expired(V),
}

impl<V> Lookup<V> {
    pub fn is_expired(&self) -> bool {
        matches!(self, Lookup::Expired(_))
    }

    pub fn value(&self) -> &V {
        match self {
            Lookup::Fresh(v) | Lookup::Expired(v) => v,
        }
    }

    /// Returns the value regardless of freshness.
    pub fn into_value(self) -> V {
        match self {
            Lookup::Fresh(v) | Lookup::Expired(v) => v,
        }
    }

    /// Returns the value only if fresh, `CacheError::Expired` otherwise.
    pub fn into_fresh(self) -> Result<V> {
        match self {
            Lookup::Fresh(v) => Ok(v),
            Lookup::Expired(_) => Err(CacheError::Expired),
        }
    }
}

// == Cache Store ==
/// LRU + TTL storage.
///
/// `capacity == 0` means unbounded.
#[derive(Debug)]
pub struct CacheStore<K, V> {
    /// Entries in recency order
    entries: LruList<K, CacheEntry<V>>,
    /// Maximum number of entries, 0 = unbounded
    capacity: usize,
    /// TTL applied to every write
    ttl: Duration,
    /// Entries dropped by LRU eviction since creation
    evictions: u64,
}

impl<K, V> CacheStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a new store.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, 0 for unbounded
    /// * `ttl` - Time-to-live applied on every `set`
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: LruList::new(),
            capacity,
            ttl,
            evictions: 0,
        }
    }

    // == Set ==
    /// Stores a value and marks it most recently used.
    ///
    /// An existing key has its value replaced and TTL restarted in place.
    /// A new key is inserted, then the least recently used entry is evicted
    /// if the store grew past capacity.
    pub fn set(&mut self, key: K, value: V) {
        if let Some(entry) = self.entries.touch(&key) {
            entry.replace(value, self.ttl);
            return;
        }

        self.entries.insert(key, CacheEntry::new(value, self.ttl));

        if self.capacity > 0
            && self.entries.len() > self.capacity
            && self.entries.evict_oldest().is_some()
        {
            self.evictions += 1;
            debug!(
                evictions = self.evictions,
                capacity = self.capacity,
                "Evicted least recently used entry"
            );
        }
    }

    // == Get ==
    /// Retrieves a value without touching recency.
    ///
    /// Returns `Lookup::Expired` with the stale value once the TTL has
    /// elapsed, and `CacheError::NotFound` when the key is absent.
    pub fn get<Q>(&self, key: &Q) -> Result<Lookup<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.entries.get(key).ok_or(CacheError::NotFound)?;
        Ok(classify(entry, Instant::now()))
    }

    // == Get And Touch ==
    /// Same as `get`, but a present key becomes most recently used.
    pub fn get_and_touch<Q>(&mut self, key: &Q) -> Result<Lookup<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.entries.touch(key).ok_or(CacheError::NotFound)?;
        Ok(classify(entry, Instant::now()))
    }

    // == Remove ==
    /// Removes an entry, returning its last value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// The key that the next eviction would drop.
    pub fn peek_lru(&self) -> Option<&K> {
        self.entries.peek_oldest()
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Keys<'_, K, CacheEntry<V>> {
        self.entries.keys()
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of LRU evictions since creation.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}

fn classify<V: Clone>(entry: &CacheEntry<V>, now: Instant) -> Lookup<V> {
    if entry.is_expired_at(now) {
        Lookup::Expired(entry.value.clone())
    } else {
        Lookup::Fresh(entry.value.clone())
    }
}

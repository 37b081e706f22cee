//! Stampede Cache
//!
//! The shared cache handle: store access under a reader-writer lock, hit/miss
//! accounting, and single-flight refresh of missing or expired keys.

use std::any::Any;
use std::borrow::Borrow;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, CacheStore, Lookup};
use crate::config::CacheOptions;
use crate::error::{CacheError, RefreshFailure, Result};
use crate::refresh::inflight::{InFlight, Join, RefreshOutcome};
use crate::refresh::CacheBuilder;
use crate::tasks::{spawn_stats_reporter, ReporterHandle, StatsSink};

// == Stampede Cache ==
/// Concurrency-safe LRU + TTL cache with coalesced refreshes.
///
/// Cloning is cheap and every clone shares the same entries, counters and
/// reporter. The reporter stops when the last clone is dropped.
pub struct StampedeCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

struct Inner<K, V> {
    options: CacheOptions,
    name: Arc<str>,
    store: Arc<RwLock<CacheStore<K, V>>>,
    inflight: Arc<InFlight<K, V>>,
    stats: Arc<CacheStats>,
    reporter: Mutex<Option<ReporterHandle>>,
}

impl<K, V> Clone for StampedeCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> StampedeCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache reporting to the default tracing sink.
    ///
    /// Outside a tokio runtime the stats reporter is skipped; counters still
    /// count.
    pub fn new(options: CacheOptions) -> Self {
        CacheBuilder::from_options(options).build()
    }

    pub(crate) fn from_parts(options: CacheOptions, sink: Arc<dyn StatsSink>) -> Self {
        let name: Arc<str> = Arc::from(options.name.as_str());
        let store = Arc::new(RwLock::new(CacheStore::new(options.capacity, options.ttl)));
        let stats = Arc::new(CacheStats::new());

        let reporter = if !options.reporting_enabled() {
            None
        } else if Handle::try_current().is_err() {
            warn!(cache = %name, "No tokio runtime, stats reporter disabled");
            None
        } else {
            Some(spawn_stats_reporter(
                Arc::clone(&name),
                Arc::clone(&stats),
                Arc::clone(&store),
                options.stat_interval,
                sink,
            ))
        };

        Self {
            inner: Arc::new(Inner {
                options,
                name,
                store,
                inflight: Arc::new(InFlight::new()),
                stats,
                reporter: Mutex::new(reporter),
            }),
        }
    }

    // == Get ==
    /// Reads a key without touching recency.
    ///
    /// Counts a hit for a fresh value and a miss otherwise.
    pub async fn get<Q>(&self, key: &Q) -> Result<Lookup<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let lookup = self.inner.store.read().await.get(key);
        self.record(&lookup);
        lookup
    }

    /// Reads a key and marks it most recently used.
    ///
    /// Takes the write lock, unlike `get`.
    pub async fn get_and_touch<Q>(&self, key: &Q) -> Result<Lookup<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let lookup = self.inner.store.write().await.get_and_touch(key);
        self.record(&lookup);
        lookup
    }

    // == Set ==
    pub async fn set(&self, key: K, value: V) {
        self.inner.store.write().await.set(key, value);
    }

    pub async fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.store.write().await.remove(key)
    }

    // == Get Or Refresh ==
    /// Returns the cached value for `key`, refreshing it if missing or expired.
    ///
    /// Only one refresh per key runs at a time; concurrent callers for the same
    /// key wait for it and share its outcome. The refresh runs on its own task
    /// without holding the store lock, so it keeps going even if the caller
    /// that started it is cancelled.
    ///
    /// On failure the error comes back with the last known value for the key,
    /// if any, in `RefreshFailure::stale`. Nothing is retried.
    ///
    /// There is no timeout here: a refresh that never resolves keeps every
    /// waiter for that key pending. Bound it inside `refresh` if the source
    /// can hang.
    pub async fn get_or_refresh<F, Fut, E>(
        &self,
        key: K,
        refresh: F,
    ) -> std::result::Result<V, RefreshFailure<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let current = self.inner.store.read().await.get(&key);
        if let Ok(Lookup::Fresh(value)) = current {
            self.inner.stats.increment_hit();
            return Ok(value);
        }
        self.inner.stats.increment_miss();
        let fallback = current.ok().map(Lookup::into_value);

        let call = match self.inner.inflight.join(key.clone()) {
            Join::Follower(call) => {
                debug!(cache = %self.inner.name, "Joining in-flight refresh");
                call
            }
            Join::Leader(call, completion) => {
                debug!(cache = %self.inner.name, "Starting refresh");
                let store = Arc::clone(&self.inner.store);
                let name = Arc::clone(&self.inner.name);

                tokio::spawn(async move {
                    let outcome = AssertUnwindSafe(refresh_entry(&store, key, refresh))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| {
                            Err(RefreshFailure::new(
                                None,
                                CacheError::RefreshAborted(panic_message(&*panic)),
                            ))
                        });

                    if let Err(failure) = &outcome {
                        warn!(
                            cache = %name,
                            error = %failure.error,
                            stale = failure.stale.is_some(),
                            "Refresh failed"
                        );
                    }
                    completion.complete(outcome);
                });
                call
            }
        };

        call.await.map_err(|mut failure| {
            if failure.stale.is_none() {
                failure.stale = fallback;
            }
            failure
        })
    }

    // == Length ==
    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.inner.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.store.read().await.is_empty()
    }

    /// Number of keys with a refresh currently running.
    pub fn refreshes_in_flight(&self) -> usize {
        self.inner.inflight.len()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn options(&self) -> &CacheOptions {
        &self.inner.options
    }

    /// Counters for the current reporting window.
    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }

    /// Stops the background stats reporter, if one is running.
    pub fn stop_stats(&self) {
        let handle = self
            .inner
            .reporter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop();
            info!(cache = %self.inner.name, "Stats reporter stopped");
        }
    }

    fn record(&self, lookup: &Result<Lookup<V>>) {
        match lookup {
            Ok(Lookup::Fresh(_)) => self.inner.stats.increment_hit(),
            _ => self.inner.stats.increment_miss(),
        }
    }
}

/// Runs one refresh for `key` and stores the result.
async fn refresh_entry<K, V, F, Fut, E>(
    store: &RwLock<CacheStore<K, V>>,
    key: K,
    refresh: F,
) -> RefreshOutcome<V>
where
    K: Hash + Eq + Clone,
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<V, E>>,
    E: Into<anyhow::Error>,
{
    // A refresh for this key may have landed since the caller's first read.
    let current = store.read().await.get(&key);
    let stale = match current {
        Ok(Lookup::Fresh(value)) => return Ok(value),
        Ok(Lookup::Expired(value)) => Some(value),
        Err(_) => None,
    };

    match refresh().await {
        Ok(value) => {
            store.write().await.set(key, value.clone());
            Ok(value)
        }
        Err(err) => Err(RefreshFailure::new(stale, CacheError::refresh_failed(err))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "refresh panicked".to_string()
    }
}

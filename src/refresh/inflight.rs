//! In-Flight Registry
//!
//! Tracks the one refresh currently running for each key. The first caller
//! for a key registers a shared future and becomes responsible for
//! completing it; later callers clone the future and await the same outcome.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

use crate::error::{CacheError, RefreshFailure};

/// What every waiter on a refresh receives.
pub type RefreshOutcome<V> = std::result::Result<V, RefreshFailure<V>>;

/// A refresh that any number of callers can await.
pub type SharedRefresh<V> = Shared<BoxFuture<'static, RefreshOutcome<V>>>;

// == Join ==
/// Result of registering interest in a key's refresh.
pub enum Join<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + 'static,
{
    /// No refresh was running; the caller must run it and report through
    /// the `Completion`.
    Leader(SharedRefresh<V>, Completion<K, V>),
    /// Another caller's refresh is running; await its outcome.
    Follower(SharedRefresh<V>),
}

// == In-Flight Registry ==
pub struct InFlight<K, V> {
    calls: Mutex<HashMap<K, SharedRefresh<V>>>,
}

impl<K, V> Default for InFlight<K, V> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> InFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    // == Join ==
    /// Joins the refresh in flight for `key`, or registers a new one.
    ///
    /// Test-and-insert happens under one lock acquisition, so exactly one
    /// concurrent caller per key comes back as `Join::Leader`.
    pub fn join(self: &Arc<Self>, key: K) -> Join<K, V> {
        let mut calls = self.lock();
        if let Some(call) = calls.get(&key) {
            return Join::Follower(call.clone());
        }

        let (tx, rx) = oneshot::channel();
        let call = async move {
            rx.await.unwrap_or_else(|_| {
                Err(RefreshFailure::new(
                    None,
                    CacheError::RefreshAborted("refresh dropped before completing".to_string()),
                ))
            })
        }
        .boxed()
        .shared();
        calls.insert(key.clone(), call.clone());

        let completion = Completion {
            registry: Arc::clone(self),
            key: Some(key),
            tx: Some(tx),
        };
        Join::Leader(call, completion)
    }

    /// Number of keys with a refresh currently running.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn unregister(&self, key: &K) {
        self.lock().remove(key);
    }

    // Poisoning only means another thread panicked around a map insert or
    // remove; the map itself is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, SharedRefresh<V>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// == Completion ==
/// The leader's obligation to finish a registered refresh.
///
/// `complete` unregisters the key and then publishes the outcome, so a waiter
/// never observes a result while the key is still marked in flight. Dropping
/// a `Completion` without completing (panic, task abort) unregisters the key
/// and resolves waiters with `CacheError::RefreshAborted`.
pub struct Completion<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + 'static,
{
    registry: Arc<InFlight<K, V>>,
    key: Option<K>,
    tx: Option<oneshot::Sender<RefreshOutcome<V>>>,
}

impl<K, V> Completion<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + 'static,
{
    pub fn complete(mut self, outcome: RefreshOutcome<V>) {
        self.unregister();
        if let Some(tx) = self.tx.take() {
            // Every waiter may have gone away; nothing to deliver then.
            let _ = tx.send(outcome);
        }
    }

    fn unregister(&mut self) {
        if let Some(key) = self.key.take() {
            self.registry.unregister(&key);
        }
    }
}

impl<K, V> Drop for Completion<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + 'static,
{
    fn drop(&mut self) {
        self.unregister();
    }
}

//! Stampede Demo - Drives a cache with concurrent readers over a slow source
//!
//! Workers hammer a small set of keys through `get_or_refresh`. The upstream
//! counter shows how many loads actually reached the source while the stats
//! reporter logs hit ratios per window.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stampede_cache::{CacheBuilder, CacheOptions, StampedeCache};

// == Demo Parameters ==
const WORKERS: usize = 32;
const KEYS: u64 = 8;
const UPSTREAM_LATENCY: Duration = Duration::from_millis(200);
const REQUEST_PAUSE: Duration = Duration::from_millis(10);
const DEFAULT_DURATION_SECS: u64 = 5;

/// Stand-in for an expensive backend.
#[derive(Default)]
struct Upstream {
    calls: AtomicUsize,
}

impl Upstream {
    async fn load(&self, key: u64) -> anyhow::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        tokio::time::sleep(UPSTREAM_LATENCY).await;
        // Every 25th load fails so the stale fallback shows up in the logs
        if call % 25 == 0 {
            anyhow::bail!("upstream unavailable for key {key}");
        }
        Ok(format!("value-{key}-v{call}"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" for this crate, override with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stampede_cache=info,stampede_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut options = CacheOptions::from_env();
    if std::env::var_os("CACHE_CAPACITY").is_none() {
        options.capacity = KEYS as usize;
    }
    let duration = demo_duration()?;
    info!(
        "Starting demo: name={}, capacity={}, ttl={}s, stat_interval={}s, duration={}s",
        options.name,
        options.capacity,
        options.ttl.as_secs(),
        options.stat_interval.as_secs(),
        duration.as_secs()
    );

    let cache: StampedeCache<u64, String> = CacheBuilder::from_options(options).build();
    let upstream = Arc::new(Upstream::default());
    let served = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            tokio::spawn(run_worker(
                worker,
                cache.clone(),
                Arc::clone(&upstream),
                Arc::clone(&served),
            ))
        })
        .collect();

    tokio::select! {
        _ = tokio::time::sleep(duration) => {
            info!("Demo duration elapsed");
        }
        result = signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C, stopping workers...");
        }
    }

    for worker in &workers {
        worker.abort();
    }
    cache.stop_stats();

    let served = served.load(Ordering::Relaxed);
    let calls = upstream.calls.load(Ordering::Relaxed);
    info!(
        "Served {} requests with {} upstream loads ({} entries cached)",
        served,
        calls,
        cache.len().await
    );
    // The reporter drains these every window, so only the unreported tail is left
    info!(
        "Unreported window: hits={}, misses={}",
        cache.stats().hits(),
        cache.stats().misses()
    );

    Ok(())
}

async fn run_worker(
    worker: usize,
    cache: StampedeCache<u64, String>,
    upstream: Arc<Upstream>,
    served: Arc<AtomicUsize>,
) {
    let mut request = worker as u64;
    loop {
        let key = request % KEYS;
        request = request.wrapping_add(WORKERS as u64 + 1);

        let source = Arc::clone(&upstream);
        match cache
            .get_or_refresh(key, move || async move { source.load(key).await })
            .await
        {
            Ok(value) => {
                debug!(worker, key, %value, "Served");
                served.fetch_add(1, Ordering::Relaxed);
            }
            Err(failure) => match failure.stale {
                Some(value) => {
                    debug!(worker, key, %value, error = %failure.error, "Served stale value");
                    served.fetch_add(1, Ordering::Relaxed);
                }
                None => warn!(worker, key, error = %failure.error, "Request failed"),
            },
        }

        tokio::time::sleep(REQUEST_PAUSE).await;
    }
}

/// Reads `DEMO_DURATION_SECS`, falling back to the default when unset.
fn demo_duration() -> anyhow::Result<Duration> {
    match std::env::var("DEMO_DURATION_SECS") {
        Ok(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid DEMO_DURATION_SECS: {raw:?}"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(DEFAULT_DURATION_SECS)),
    }
}

//! Integration Tests for the Cache Facade
//!
//! Exercises the public API end to end: coalesced refreshes, stale fallback,
//! eviction, TTL boundaries and the stats reporter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use stampede_cache::{CacheBuilder, CacheError, Lookup, StampedeCache, StatsSnapshot};
use tokio::sync::Barrier;

// == Helper Functions ==

fn create_test_cache(capacity: usize, ttl: Duration) -> StampedeCache<u32, String> {
    CacheBuilder::new()
        .with_name("integration")
        .with_capacity(capacity)
        .with_ttl(ttl)
        .with_stat_interval(Duration::ZERO)
        .build()
}

type Collected = Arc<Mutex<Vec<StatsSnapshot>>>;

fn create_reporting_cache(interval: Duration) -> (StampedeCache<u32, String>, Collected) {
    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let collected = Arc::clone(&collected);
        move |snapshot: &StatsSnapshot| collected.lock().unwrap().push(snapshot.clone())
    };
    let cache = CacheBuilder::new()
        .with_name("reported")
        .with_capacity(10)
        .with_ttl(Duration::from_secs(60))
        .with_stat_interval(interval)
        .with_sink(sink)
        .build();
    (cache, collected)
}

// == Single-Flight Tests ==

#[tokio::test(start_paused = true)]
async fn test_concurrent_misses_share_one_refresh() {
    let cache = create_test_cache(10, Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));

    let requests = (0..16).map(|_| {
        let calls = Arc::clone(&calls);
        cache.get_or_refresh(7, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, anyhow::Error>("loaded".to_string())
        })
    });
    let results = join_all(requests).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| matches!(r, Ok(v) if v == "loaded")));
    assert_eq!(cache.refreshes_in_flight(), 0);
    assert_eq!(
        cache.get(&7).await.unwrap(),
        Lookup::Fresh("loaded".to_string())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_single_flight_across_worker_threads() {
    const TASKS: usize = 32;
    const ROUNDS: usize = 50;

    let cache = create_test_cache(10, Duration::from_secs(60));

    for round in 0..ROUNDS {
        cache.remove(&1).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(TASKS));

        let tasks: Vec<_> = (0..TASKS)
            .map(|_| {
                let cache = cache.clone();
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    cache
                        .get_or_refresh(1, move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            Ok::<_, anyhow::Error>(format!("round-{round}"))
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            let value = task.await.unwrap().unwrap();
            assert_eq!(value, format!("round-{round}"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "round {round}");
        assert_eq!(cache.refreshes_in_flight(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_failures_are_shared() {
    let cache = create_test_cache(10, Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));

    let requests = (0..8).map(|_| {
        let calls = Arc::clone(&calls);
        cache.get_or_refresh(1, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(500)).await;
            Err::<String, _>(anyhow::anyhow!("database offline"))
        })
    });
    let results = join_all(requests).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        let failure = result.unwrap_err();
        assert!(failure.stale.is_none());
        assert!(matches!(failure.error, CacheError::RefreshFailed(_)));
        assert!(failure.error.to_string().contains("database offline"));
    }
    assert!(matches!(cache.get(&1).await, Err(CacheError::NotFound)));
}

#[tokio::test(start_paused = true)]
async fn test_different_keys_refresh_independently() {
    let cache = create_test_cache(10, Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));

    let requests = (0..4u32).map(|key| {
        let calls = Arc::clone(&calls);
        cache.get_or_refresh(key, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, anyhow::Error>(format!("v{key}"))
        })
    });

    let start = tokio::time::Instant::now();
    let results = join_all(requests).await;

    // All four ran side by side rather than one after another
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    for (key, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), format!("v{key}"));
    }
    assert_eq!(cache.len().await, 4);
}

#[tokio::test(start_paused = true)]
async fn test_key_can_refresh_again_after_completion() {
    let cache = create_test_cache(10, Duration::from_secs(5));
    let calls = Arc::new(AtomicUsize::new(0));

    let load = |calls: Arc<AtomicUsize>| {
        move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok::<_, anyhow::Error>(format!("v{n}"))
        }
    };

    assert_eq!(
        cache.get_or_refresh(3, load(Arc::clone(&calls))).await.unwrap(),
        "v1"
    );
    assert_eq!(
        cache.get_or_refresh(3, load(Arc::clone(&calls))).await.unwrap(),
        "v1"
    );

    tokio::time::advance(Duration::from_secs(6)).await;

    assert_eq!(
        cache.get_or_refresh(3, load(Arc::clone(&calls))).await.unwrap(),
        "v2"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_skipped_when_value_arrives_first() {
    let cache = create_test_cache(10, Duration::from_secs(60));
    cache.set(9, "written".to_string()).await;
    let calls = Arc::new(AtomicUsize::new(0));

    let counted = Arc::clone(&calls);
    let value = cache
        .get_or_refresh(9, move || async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>("loaded".to_string())
        })
        .await
        .unwrap();

    assert_eq!(value, "written");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// == Stale Fallback Tests ==

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_returns_stale_value() {
    let cache = create_test_cache(10, Duration::from_secs(2));
    cache.set(1, "v1".to_string()).await;

    tokio::time::advance(Duration::from_secs(3)).await;

    let failure = cache
        .get_or_refresh(1, || async { Err::<String, _>(anyhow::anyhow!("timeout")) })
        .await
        .unwrap_err();

    assert_eq!(failure.stale.as_deref(), Some("v1"));
    assert!(matches!(failure.error, CacheError::RefreshFailed(_)));
    // Failed refresh leaves the expired entry in place
    assert_eq!(
        cache.get(&1).await.unwrap(),
        Lookup::Expired("v1".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_successful_refresh_replaces_expired_value() {
    let cache = create_test_cache(10, Duration::from_secs(2));
    cache.set(1, "v1".to_string()).await;

    tokio::time::advance(Duration::from_secs(3)).await;

    let value = cache
        .get_or_refresh(1, || async { Ok::<_, anyhow::Error>("v2".to_string()) })
        .await
        .unwrap();

    assert_eq!(value, "v2");
    assert_eq!(
        cache.get(&1).await.unwrap(),
        Lookup::Fresh("v2".to_string())
    );
}

// == Eviction and TTL Tests ==

#[tokio::test]
async fn test_eviction_through_facade() {
    let cache = create_test_cache(3, Duration::from_secs(60));
    for key in 1..=5 {
        cache.set(key, format!("v{key}")).await;
    }

    assert_eq!(cache.len().await, 3);
    assert!(matches!(cache.get(&1).await, Err(CacheError::NotFound)));
    assert!(matches!(cache.get(&2).await, Err(CacheError::NotFound)));
    for key in 3..=5 {
        assert_eq!(cache.get(&key).await.unwrap().into_value(), format!("v{key}"));
    }
}

#[tokio::test]
async fn test_touched_key_survives_eviction() {
    let cache = create_test_cache(3, Duration::from_secs(60));
    for key in 1..=3 {
        cache.set(key, format!("v{key}")).await;
    }

    cache.get_and_touch(&1).await.unwrap();
    cache.set(4, "v4".to_string()).await;

    assert!(cache.get(&1).await.is_ok());
    assert!(matches!(cache.get(&2).await, Err(CacheError::NotFound)));
}

#[tokio::test(start_paused = true)]
async fn test_ttl_boundary_through_facade() {
    let cache = create_test_cache(10, Duration::from_secs(10));
    cache.set(1, "v1".to_string()).await;

    tokio::time::advance(Duration::from_secs(9)).await;
    assert_eq!(
        cache.get(&1).await.unwrap(),
        Lookup::Fresh("v1".to_string())
    );

    tokio::time::advance(Duration::from_secs(2)).await;
    let lookup = cache.get(&1).await.unwrap();
    assert!(lookup.is_expired());
    assert_eq!(lookup.into_value(), "v1");
}

// == Stats Reporter Tests ==

#[tokio::test(start_paused = true)]
async fn test_reporter_windows_reset_between_reports() {
    let (cache, collected) = create_reporting_cache(Duration::from_secs(10));
    cache.set(1, "v1".to_string()).await;

    cache.get(&1).await.unwrap();
    cache.get(&1).await.unwrap();
    cache.get(&1).await.unwrap();
    assert!(cache.get(&2).await.is_err());

    tokio::time::sleep(Duration::from_secs(11)).await;

    cache.get(&2).await.unwrap_err();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let snapshots = collected.lock().unwrap().clone();
    assert_eq!(snapshots.len(), 2);

    assert_eq!(snapshots[0].name, "reported");
    assert_eq!((snapshots[0].hits, snapshots[0].misses), (3, 1));
    assert_eq!(snapshots[0].total_ops, 4);
    assert!((snapshots[0].hit_ratio - 0.75).abs() < 1e-9);
    assert_eq!(snapshots[0].size, 1);

    assert_eq!((snapshots[1].hits, snapshots[1].misses), (0, 1));
    assert_eq!(snapshots[1].hit_ratio, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_reporter_stays_quiet_when_idle() {
    let (cache, collected) = create_reporting_cache(Duration::from_secs(1));

    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(collected.lock().unwrap().is_empty());
    drop(cache);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_reporter_emits_nothing() {
    let (cache, collected) = create_reporting_cache(Duration::from_secs(1));
    cache.stop_stats();

    cache.get(&1).await.unwrap_err();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(collected.lock().unwrap().is_empty());
    assert_eq!(cache.stats().misses(), 1);
}

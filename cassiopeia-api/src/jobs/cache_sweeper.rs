//! Cache Sweeper Background Task
//!
//! Reads already treat expired entries as misses, so sweeping only reclaims
//! space. For LMDB that keeps the memory map from filling with dead entries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cassiopeia_storage::CacheStore;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::telemetry::metrics;

/// Counters for sweeper activity since startup.
#[derive(Debug, Default)]
pub struct CacheSweeperMetrics {
    /// Entries removed
    pub entries_purged: AtomicU64,

    /// Sweep cycles completed
    pub sweep_cycles: AtomicU64,

    /// Cycles that failed
    pub sweep_errors: AtomicU64,
}

impl CacheSweeperMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Periodically remove expired entries from `store` until shutdown.
///
/// The first sweep runs immediately. Returns the collected counters once the
/// shutdown signal is observed.
pub async fn cache_sweeper_task(
    store: Arc<dyn CacheStore>,
    sweep_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<CacheSweeperMetrics> {
    let counters = Arc::new(CacheSweeperMetrics::new());

    let mut ticker = interval(sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = sweep_interval.as_secs(),
        backend = store.backend_name(),
        "Cache sweeper started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache sweeper shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                sweep_once(store.as_ref(), &counters).await;
            }
        }
    }

    tracing::info!(
        entries_purged = counters.entries_purged.load(Ordering::Relaxed),
        sweep_cycles = counters.sweep_cycles.load(Ordering::Relaxed),
        sweep_errors = counters.sweep_errors.load(Ordering::Relaxed),
        "Cache sweeper completed"
    );

    counters
}

async fn sweep_once(store: &dyn CacheStore, counters: &CacheSweeperMetrics) {
    counters.sweep_cycles.fetch_add(1, Ordering::Relaxed);

    match store.purge_expired().await {
        Ok(0) => tracing::trace!("Cache sweep found nothing to purge"),
        Ok(purged) => {
            counters.entries_purged.fetch_add(purged, Ordering::Relaxed);
            if let Some(m) = metrics() {
                m.record_purged(store.backend_name(), purged);
            }
            tracing::info!(purged, backend = store.backend_name(), "Purged expired cache entries");
        }
        Err(e) => {
            counters.sweep_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, backend = store.backend_name(), "Cache sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cassiopeia_core::CacheKeyBuilder;
    use cassiopeia_storage::InMemoryCacheStore;
    use cassiopeia_test_utils::{fixtures, FailingCacheStore};

    #[tokio::test]
    async fn test_sweeper_purges_expired_entries() {
        let store = Arc::new(InMemoryCacheStore::new());
        let keys = CacheKeyBuilder::default();
        let expired = keys.build_today(1.0, 2.0, 7);
        let live = keys.build_today(3.0, 4.0, 7);
        store
            .put(&expired, &fixtures::sample_events(), Duration::ZERO)
            .await
            .expect("put expired");
        store
            .put(&live, &fixtures::sample_events(), Duration::from_secs(3600))
            .await
            .expect("put live");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(cache_sweeper_task(
            store.clone(),
            Duration::from_millis(10),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = shutdown_tx.send(true);
        let counters = handle.await.expect("sweeper task");

        assert_eq!(counters.entries_purged.load(Ordering::Relaxed), 1);
        assert!(counters.sweep_cycles.load(Ordering::Relaxed) >= 1);
        assert_eq!(store.len(), 1);
        assert!(store.has(&live).await.expect("has"));
    }

    #[tokio::test]
    async fn test_sweeper_survives_store_errors() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(cache_sweeper_task(
            Arc::new(FailingCacheStore),
            Duration::from_millis(10),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(40)).await;
        let _ = shutdown_tx.send(true);
        let counters = handle.await.expect("sweeper task");

        assert!(counters.sweep_errors.load(Ordering::Relaxed) >= 1);
        assert_eq!(counters.entries_purged.load(Ordering::Relaxed), 0);
    }
}

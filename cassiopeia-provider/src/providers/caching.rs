//! Cache-aside decorator over any [`EventDataProvider`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cassiopeia_core::{AstroEvent, AstroResult, CacheKeyBuilder, DEFAULT_CACHE_TTL};
use cassiopeia_storage::CacheStore;

use crate::EventDataProvider;

/// Checks the cache before delegating, and stores what the inner provider
/// returns.
///
/// The call blocks its caller for the full inner fetch on a miss. Failures
/// from the inner provider are returned as-is and nothing is cached for them.
/// Store errors propagate too; callers running in the background treat them
/// as a failed attempt.
pub struct CachingProvider<P> {
    inner: P,
    store: Arc<dyn CacheStore>,
    keys: CacheKeyBuilder,
    ttl: Duration,
    label: String,
}

impl<P: EventDataProvider> CachingProvider<P> {
    pub fn new(inner: P, store: Arc<dyn CacheStore>) -> Self {
        let label = format!("caching({})", inner.name());
        Self {
            inner,
            store,
            keys: CacheKeyBuilder::default(),
            ttl: DEFAULT_CACHE_TTL,
            label,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_key_builder(mut self, keys: CacheKeyBuilder) -> Self {
        self.keys = keys;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: EventDataProvider> EventDataProvider for CachingProvider<P> {
    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        days_ahead: u32,
    ) -> AstroResult<Vec<AstroEvent>> {
        let key = self.keys.build_today(latitude, longitude, days_ahead);

        if let Some(events) = self.store.get(&key).await? {
            tracing::debug!(key = %key, events = events.len(), "Cache hit");
            return Ok(events);
        }

        let events = self.inner.fetch(latitude, longitude, days_ahead).await?;
        self.store.put(&key, &events, self.ttl).await?;
        tracing::debug!(
            key = %key,
            events = events.len(),
            ttl_secs = self.ttl.as_secs(),
            "Cached fresh events"
        );
        Ok(events)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cassiopeia_core::{AstroError, CacheError, CacheKey, UpstreamError};
    use cassiopeia_storage::{CacheStats, InMemoryCacheStore};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl EventDataProvider for CountingProvider {
        async fn fetch(&self, _: f64, _: f64, _: u32) -> AstroResult<Vec<AstroEvent>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(UpstreamError::ServiceUnavailable {
                    attempts: 3,
                    last_error: "HTTP 500".to_string(),
                }
                .into());
            }
            Ok(vec![AstroEvent::new(
                "Sun - Sunrise",
                Utc::now(),
                "Astronomical event of type Sunrise for body Sun.",
                serde_json::Value::Null,
            )])
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn has(&self, _: &CacheKey) -> AstroResult<bool> {
            Err(unavailable())
        }
        async fn get(&self, _: &CacheKey) -> AstroResult<Option<Vec<AstroEvent>>> {
            Err(unavailable())
        }
        async fn put(&self, _: &CacheKey, _: &[AstroEvent], _: Duration) -> AstroResult<()> {
            Err(unavailable())
        }
        async fn delete(&self, _: &CacheKey) -> AstroResult<bool> {
            Err(unavailable())
        }
        async fn purge_expired(&self) -> AstroResult<u64> {
            Err(unavailable())
        }
        async fn stats(&self) -> AstroResult<CacheStats> {
            Err(unavailable())
        }
        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    fn unavailable() -> AstroError {
        CacheError::StoreUnavailable {
            reason: "connection refused".to_string(),
        }
        .into()
    }

    fn counting(fail: bool) -> (CountingProvider, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            CountingProvider {
                calls: Arc::clone(&calls),
                fail,
            },
            calls,
        )
    }

    #[tokio::test]
    async fn test_warm_cache_skips_upstream() {
        let (inner, calls) = counting(false);
        let store = Arc::new(InMemoryCacheStore::new());
        let provider = CachingProvider::new(inner, store.clone());

        let first = provider.fetch(55.75, 37.61, 7).await.expect("first fetch");
        let second = provider.fetch(55.75, 37.61, 7).await.expect("second fetch");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_nearby_coordinates_share_entry() {
        let (inner, calls) = counting(false);
        let provider = CachingProvider::new(inner, Arc::new(InMemoryCacheStore::new()));

        provider.fetch(55.750_01, 37.61, 7).await.expect("fetch");
        provider.fetch(55.749_99, 37.610_02, 7).await.expect("fetch");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        provider.fetch(55.7501, 37.61, 7).await.expect("fetch");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_entry_uses_configured_ttl() {
        let (inner, calls) = counting(false);
        let provider = CachingProvider::new(inner, Arc::new(InMemoryCacheStore::new()))
            .with_ttl(Duration::ZERO);

        provider.fetch(1.0, 2.0, 7).await.expect("fetch");
        provider.fetch(1.0, 2.0, 7).await.expect("fetch");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (inner, calls) = counting(true);
        let store = Arc::new(InMemoryCacheStore::new());
        let provider = CachingProvider::new(inner, store.clone());

        let err = provider.fetch(1.0, 2.0, 7).await;
        assert!(matches!(err, Err(AstroError::Upstream(_))));
        assert!(store.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_outage_propagates() {
        let (inner, calls) = counting(false);
        let provider = CachingProvider::new(inner, Arc::new(BrokenStore));

        let err = provider.fetch(1.0, 2.0, 7).await;
        assert!(matches!(
            err,
            Err(AstroError::Cache(CacheError::StoreUnavailable { .. }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_label_wraps_inner_name() {
        let (inner, _) = counting(false);
        let provider = CachingProvider::new(inner, Arc::new(InMemoryCacheStore::new()));
        assert_eq!(provider.name(), "caching(counting)");
        assert_eq!(provider.ttl(), DEFAULT_CACHE_TTL);
    }
}

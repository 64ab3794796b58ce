//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use cassiopeia_core::CacheKeyBuilder;
use cassiopeia_storage::{CacheStore, InMemoryCacheStore, LmdbCacheStore};

use crate::config::{CacheBackendKind, CacheSettings};
use crate::error::{ApiError, ApiResult};
use crate::jobs::{JobQueue, JobStats};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Store read by the events endpoint and written by refresh workers.
    pub store: Arc<dyn CacheStore>,
    /// Producer side of the refresh queue.
    pub queue: JobQueue,
    pub jobs: Arc<JobStats>,
    pub keys: CacheKeyBuilder,
    /// Seconds clients should wait before polling a PROCESSING result.
    pub retry_after_secs: u64,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn CacheStore>, queue: JobQueue, retry_after_secs: u64) -> Self {
        let jobs = queue.stats();
        Self {
            store,
            queue,
            jobs,
            keys: CacheKeyBuilder::default(),
            retry_after_secs,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<dyn CacheStore>, store);
crate::impl_from_ref!(Arc<JobStats>, jobs);
crate::impl_from_ref!(Instant, start_time);

/// Open the configured cache backend.
pub fn open_cache_store(settings: &CacheSettings) -> ApiResult<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match settings.backend {
        CacheBackendKind::Lmdb => {
            let store = LmdbCacheStore::open(&settings.path, settings.max_size_mb).map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to open cache at {}: {}",
                    settings.path.display(),
                    e
                ))
            })?;
            Arc::new(store)
        }
        CacheBackendKind::Memory => {
            tracing::warn!("Using in-memory cache store; entries will not survive a restart");
            Arc::new(InMemoryCacheStore::new())
        }
    };

    tracing::info!(
        backend = store.backend_name(),
        path = %settings.path.display(),
        ttl_secs = settings.ttl.as_secs(),
        "Cache store opened"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::RefreshJobConfig;

    #[test]
    fn test_open_memory_store() {
        let settings = CacheSettings {
            backend: CacheBackendKind::Memory,
            ..Default::default()
        };
        let store = open_cache_store(&settings).expect("memory store");
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_open_lmdb_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = CacheSettings {
            backend: CacheBackendKind::Lmdb,
            path: dir.path().join("cache"),
            max_size_mb: 16,
            ..Default::default()
        };
        let store = open_cache_store(&settings).expect("lmdb store");
        assert_eq!(store.backend_name(), "lmdb");
    }

    #[test]
    fn test_state_shares_queue_stats() {
        let (queue, _receiver) = JobQueue::channel(&RefreshJobConfig::default());
        let state = AppState::new(Arc::new(InMemoryCacheStore::new()), queue.clone(), 10);
        assert!(Arc::ptr_eq(&state.jobs, &queue.stats()));
    }
}

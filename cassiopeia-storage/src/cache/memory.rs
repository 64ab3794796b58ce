//! In-process cache store on a sharded concurrent map.
//!
//! Same TTL semantics as the LMDB store but nothing survives a restart.
//! Used by tests and by `CASSIOPEIA_CACHE_BACKEND=memory` for local runs.

use std::time::Duration;

use async_trait::async_trait;
use cassiopeia_core::{AstroEvent, AstroResult, CacheKey};
use chrono::Utc;
use dashmap::DashMap;

use super::entry::CacheEntry;
use super::traits::{CacheStats, CacheStore, StatsRecorder};

#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
    stats: StatsRecorder,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn has(&self, key: &CacheKey) -> AstroResult<bool> {
        let now = Utc::now();
        Ok(self
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now)))
    }

    async fn get(&self, key: &CacheKey) -> AstroResult<Option<Vec<AstroEvent>>> {
        let now = Utc::now();
        // Clone out of the shard guard before touching the map again.
        let found = self
            .entries
            .get(key)
            .map(|entry| (entry.is_expired_at(now), entry.value.clone()));

        match found {
            None => {
                self.stats.record_miss();
                Ok(None)
            }
            Some((true, _)) => {
                self.stats.record_expired();
                Ok(None)
            }
            Some((false, value)) => {
                self.stats.record_hit();
                Ok(Some(value))
            }
        }
    }

    async fn put(&self, key: &CacheKey, events: &[AstroEvent], ttl: Duration) -> AstroResult<()> {
        let entry = CacheEntry::new(key.clone(), events.to_vec(), ttl, Utc::now());
        self.entries.insert(key.clone(), entry);
        self.stats.record_write();
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> AstroResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn purge_expired(&self) -> AstroResult<u64> {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let purged = before.saturating_sub(self.entries.len()) as u64;
        self.stats.record_evictions(purged);
        Ok(purged)
    }

    async fn stats(&self) -> AstroResult<CacheStats> {
        Ok(self.stats.snapshot(self.entries.len() as u64))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

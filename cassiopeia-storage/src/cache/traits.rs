//! The cache store contract and shared statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cassiopeia_core::{AstroEvent, AstroResult, CacheKey};
use serde::{Deserialize, Serialize};

/// Key/value store with per-entry expiry, shared by request handlers and
/// refresh workers.
///
/// # Concurrency
///
/// Implementations must tolerate any number of concurrent callers. Keys are
/// independent: a write to one key never blocks or invalidates another, and
/// there is no cross-key locking.
///
/// # Expiry
///
/// `get` and `has` treat an entry with `now >= expires_at` as absent.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether a live entry exists for `key`.
    async fn has(&self, key: &CacheKey) -> AstroResult<bool>;

    /// Fetch the live value for `key`, or `None` on a miss (absent or expired).
    async fn get(&self, key: &CacheKey) -> AstroResult<Option<Vec<AstroEvent>>>;

    /// Store `events` under `key`, replacing any previous entry wholesale.
    async fn put(&self, key: &CacheKey, events: &[AstroEvent], ttl: Duration) -> AstroResult<()>;

    /// Remove `key`. Returns whether something was removed.
    async fn delete(&self, key: &CacheKey) -> AstroResult<bool>;

    /// Physically remove every expired entry. Returns the number removed.
    async fn purge_expired(&self) -> AstroResult<u64>;

    /// Usage statistics since this store handle was created.
    async fn stats(&self) -> AstroResult<CacheStats>;

    /// Short backend label for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Reads that returned a live entry.
    pub hits: u64,
    /// Reads that found nothing usable (includes expired reads).
    pub misses: u64,
    /// Reads that found an entry past its expiry.
    pub expired: u64,
    /// Successful writes.
    pub writes: u64,
    /// Entries currently held, live or expired.
    pub entry_count: u64,
    /// Entries removed by `purge_expired`.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters backing [`CacheStats`].
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Snapshot the counters, pairing them with the backend's entry count.
    pub fn snapshot(&self, entry_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            entry_count,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

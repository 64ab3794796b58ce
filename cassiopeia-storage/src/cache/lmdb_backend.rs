//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped,
//! transactional key/value file. The file outlives the process and can be
//! opened by several processes at once, so request handlers and refresh
//! workers see the same entries even when they run apart.
//!
//! # Thread Safety
//!
//! - Read transactions for `get`, `has` and `stats`
//! - Write transactions for `put`, `delete` and `purge_expired`
//! - Statistics are tracked with atomic counters

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use cassiopeia_core::{AstroError, AstroEvent, AstroResult, CacheError, CacheKey};
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::entry::{decode_expiry, CacheEntry};
use super::traits::{CacheStats, CacheStore, StatsRecorder};

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for AstroError {
    fn from(e: LmdbCacheError) -> Self {
        AstroError::Cache(CacheError::StoreUnavailable {
            reason: e.to_string(),
        })
    }
}

fn txn_err(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

/// Durable cache store on a single unnamed LMDB database.
///
/// # Example
///
/// ```ignore
/// use cassiopeia_storage::{CacheStore, LmdbCacheStore};
/// use std::time::Duration;
///
/// let store = LmdbCacheStore::open("./data/cache", 256)?;
/// store.put(&key, &events, Duration::from_secs(7200)).await?;
/// let cached = store.get(&key).await?;
/// ```
pub struct LmdbCacheStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    stats: StatsRecorder,
}

impl LmdbCacheStore {
    /// Open (or create) a store in `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the memory map in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per store and the file is not
        // truncated or remapped behind heed's back.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb.max(1) * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self {
            env,
            db,
            stats: StatsRecorder::new(),
        })
    }

    fn read_raw(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, LmdbCacheError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let bytes = self
            .db
            .get(&rtxn, key.as_bytes())
            .map_err(txn_err)?
            .map(|b| b.to_vec());
        Ok(bytes)
    }

    /// Keys whose expiry header is at or before now.
    fn collect_expired_keys(&self) -> Result<Vec<Vec<u8>>, LmdbCacheError> {
        let now = Utc::now();
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let iter = self.db.iter(&rtxn).map_err(txn_err)?;

        let mut keys = Vec::new();
        for result in iter {
            let (key, value) = result.map_err(txn_err)?;
            let expired = decode_expiry(value).map_or(true, |expires_at| now >= expires_at);
            if expired {
                keys.push(key.to_vec());
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
    async fn has(&self, key: &CacheKey) -> AstroResult<bool> {
        let live = self
            .read_raw(key)?
            .and_then(|bytes| decode_expiry(&bytes))
            .is_some_and(|expires_at| Utc::now() < expires_at);
        Ok(live)
    }

    async fn get(&self, key: &CacheKey) -> AstroResult<Option<Vec<AstroEvent>>> {
        let Some(bytes) = self.read_raw(key)? else {
            self.stats.record_miss();
            return Ok(None);
        };

        let entry = match CacheEntry::decode(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                // Unreadable entries are misses; the next refresh overwrites them.
                tracing::warn!(key = %key, error = %e, "Discarding corrupted cache entry");
                self.stats.record_miss();
                return Ok(None);
            }
        };

        if entry.is_expired_at(Utc::now()) {
            self.stats.record_expired();
            return Ok(None);
        }

        self.stats.record_hit();
        Ok(Some(entry.value))
    }

    async fn put(&self, key: &CacheKey, events: &[AstroEvent], ttl: Duration) -> AstroResult<()> {
        let entry = CacheEntry::new(key.clone(), events.to_vec(), ttl, Utc::now());
        let bytes = entry.encode()?;

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &bytes)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;

        self.stats.record_write();
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> AstroResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let deleted = self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(deleted)
    }

    async fn purge_expired(&self) -> AstroResult<u64> {
        let candidates = self.collect_expired_keys()?;
        if candidates.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let mut deleted = 0u64;
        for key in &candidates {
            // Re-check under the write lock: a refresh may have landed since the scan.
            let still_expired = match self.db.get(&wtxn, key).map_err(txn_err)? {
                Some(value) => decode_expiry(value).map_or(true, |expires_at| now >= expires_at),
                None => false,
            };
            if still_expired && self.db.delete(&mut wtxn, key).map_err(txn_err)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;

        self.stats.record_evictions(deleted);
        Ok(deleted)
    }

    async fn stats(&self) -> AstroResult<CacheStats> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let entry_count = self.db.len(&rtxn).map_err(txn_err)?;
        Ok(self.stats.snapshot(entry_count))
    }

    fn backend_name(&self) -> &'static str {
        "lmdb"
    }
}

impl std::fmt::Debug for LmdbCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbCacheStore")
            .field("path", &self.env.path())
            .finish()
    }
}

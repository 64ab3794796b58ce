//! TTL cache for event lists keyed by [`CacheKey`](cassiopeia_core::CacheKey).
//!
//! # Expiry
//!
//! Every entry carries an absolute `expires_at`. Backends enforce it on read:
//! once `now >= expires_at` the entry is reported as a miss, exactly as if it
//! had never been written. Callers never look at timestamps themselves.
//! Expired entries stay on disk until [`CacheStore::purge_expired`] runs.
//!
//! # Backends
//!
//! - [`LmdbCacheStore`]: memory-mapped LMDB file. Durable across restarts and
//!   safe to share between processes.
//! - [`InMemoryCacheStore`]: sharded in-process map for tests and local runs.

pub mod entry;
pub mod lmdb_backend;
pub mod memory;
pub mod traits;

pub use entry::CacheEntry;
pub use lmdb_backend::{LmdbCacheError, LmdbCacheStore};
pub use memory::InMemoryCacheStore;
pub use traits::{CacheStats, CacheStore, StatsRecorder};

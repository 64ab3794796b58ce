//! Cassiopeia Storage - TTL cache stores
//!
//! The cache store is the only shared mutable resource in the system: request
//! handlers read from it, refresh workers write to it. Both go through the
//! [`CacheStore`] trait so either side can be handed a different backend.

pub mod cache;

pub use cache::{
    CacheEntry, CacheStats, CacheStore, InMemoryCacheStore, LmdbCacheError, LmdbCacheStore,
    StatsRecorder,
};

//! Event data provider implementations
//!
//! `astronomy` talks to the upstream API; `caching` layers the cache-aside
//! pattern over any other provider.

pub mod astronomy;
pub mod caching;

pub use astronomy::{AstronomyClient, RemoteProvider};
pub use caching::CachingProvider;

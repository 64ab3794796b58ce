//! Cassiopeia Provider - event data sources
//!
//! One capability, [`EventDataProvider::fetch`], with two implementations:
//! [`RemoteProvider`] calls the upstream astronomy API and parses its rows,
//! [`CachingProvider`] wraps any provider with cache-aside logic. Because the
//! decorator only needs the trait, providers layer freely and tests can swap
//! in fakes at any level.

pub mod config;
pub mod providers;

use std::sync::Arc;

use async_trait::async_trait;
use cassiopeia_core::{AstroEvent, AstroResult};

pub use config::AstronomyConfig;
pub use providers::astronomy::{parse_events, AstronomyClient, EventsQuery, ParsedEvents};
pub use providers::{CachingProvider, RemoteProvider};

// ============================================================================
// EVENT DATA PROVIDER TRAIT
// ============================================================================

/// Source of astronomical events for an observer position.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// let remote = RemoteProvider::new(AstronomyClient::new(config)?);
/// let cached = CachingProvider::new(remote, store);
/// let events = cached.fetch(55.75, 37.61, 7).await?;
/// ```
#[async_trait]
pub trait EventDataProvider: Send + Sync {
    /// Events visible from `(latitude, longitude)` over the next `days_ahead` days.
    ///
    /// # Returns
    /// * `Ok(Vec<AstroEvent>)` - possibly empty
    /// * `Err(AstroError::Upstream)` - the source could not be reached or refused
    /// * `Err(AstroError::Cache)` - a caching layer could not read or write its store
    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        days_ahead: u32,
    ) -> AstroResult<Vec<AstroEvent>>;

    /// Short identifier for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: EventDataProvider + ?Sized> EventDataProvider for Arc<T> {
    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        days_ahead: u32,
    ) -> AstroResult<Vec<AstroEvent>> {
        (**self).fetch(latitude, longitude, days_ahead).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

//! Cassiopeia Core - shared types for the astronomy events cache
//!
//! Holds the event model, the deterministic cache key scheme, coordinate
//! validation and the error taxonomy used by every other crate. Nothing in
//! here performs I/O.

pub mod config;
pub mod error;
pub mod event;
pub mod geo;
pub mod key;

use std::time::Duration;

pub use config::RetryConfig;
pub use error::{
    parse_retry_after, AstroError, AstroResult, CacheError, ConfigError, ParseError,
    UpstreamError, ValidationError,
};
pub use event::AstroEvent;
pub use geo::{Coordinates, MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE};
pub use key::{round_coordinate, CacheKey, CacheKeyBuilder, COORDINATE_PRECISION, DEFAULT_KEY_PREFIX};

// ============================================================================
// SHARED DEFAULTS
// ============================================================================

/// Look-ahead window used for every cache-backing fetch.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Lifetime of a cached event list (2 hours).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7200);

/// Attempts per upstream call before giving up.
pub const DEFAULT_UPSTREAM_ATTEMPTS: u32 = 3;

/// Attempts per refresh job before it is dropped.
pub const DEFAULT_JOB_ATTEMPTS: u32 = 3;

/// Suggested client polling delay while a refresh is in flight.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 10;

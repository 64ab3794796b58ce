//! Constants for the Cassiopeia API
//!
//! Defaults for every environment-driven setting live here so they are easy
//! to find and to reference from tests.

// ============================================================================
// HTTP SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// EVENTS ENDPOINT
// ============================================================================

/// Message returned with every `PROCESSING` response.
pub const PROCESSING_MESSAGE: &str =
    "Data is being fetched in the background. Please try again in a few seconds.";

// ============================================================================
// CACHE
// ============================================================================

/// Default LMDB directory
pub const DEFAULT_CACHE_PATH: &str = "./data/cache";

/// Default LMDB map size in megabytes
pub const DEFAULT_CACHE_MAX_SIZE_MB: usize = 256;

/// Default interval between expired-entry sweeps (10 minutes)
pub const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 600;

// ============================================================================
// REFRESH JOBS
// ============================================================================

/// Default number of refresh workers
pub const DEFAULT_REFRESH_WORKERS: usize = 4;

/// Default bounded queue capacity
pub const DEFAULT_REFRESH_QUEUE_CAPACITY: usize = 1024;

/// Default delay before a failed job is re-enqueued
pub const DEFAULT_REFRESH_RETRY_DELAY_MS: u64 = 1000;

/// Default single-flight lease (only used when single-flight is enabled)
pub const DEFAULT_REFRESH_LEASE_SECS: u64 = 60;

// ============================================================================
// TELEMETRY
// ============================================================================

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str =
    "cassiopeia_api=debug,cassiopeia_provider=info,tower_http=debug,info";

/// Service name reported in startup logs
pub const SERVICE_NAME: &str = "cassiopeia-api";

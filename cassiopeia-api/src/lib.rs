//! Cassiopeia API - HTTP layer
//!
//! Serves astronomy events for an observer position from a TTL cache and
//! refreshes missing entries in the background. Reads never wait on the
//! upstream API: a miss answers `202 PROCESSING` and enqueues a refresh job.

pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
mod macros;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::{ApiConfig, CacheBackendKind, CacheSettings};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{
    cache_sweeper_task, EnqueueError, EnqueueOutcome, JobQueue, JobStats, RefreshJob,
    RefreshJobConfig, RefreshWorkerPool,
};
pub use routes::create_api_router;
pub use server::serve_until;
pub use state::{open_cache_store, AppState};

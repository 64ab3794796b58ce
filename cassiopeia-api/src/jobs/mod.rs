//! Background Jobs for the Cassiopeia API
//!
//! - `refresh`: queue and worker pool that backfill the cache on misses
//! - `cache_sweeper`: removes expired entries on a fixed interval
//!
//! Both are spawned during server startup and stop on a shared shutdown
//! signal:
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(cache_sweeper_task(store.clone(), settings.sweep_interval, shutdown_rx.clone()));
//! let pool = RefreshWorkerPool::spawn(provider, queue.clone(), receiver, &config, shutdown_rx);
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! pool.join().await;
//! ```

pub mod cache_sweeper;
pub mod refresh;

pub use cache_sweeper::{cache_sweeper_task, CacheSweeperMetrics};
pub use refresh::{
    EnqueueError, EnqueueOutcome, InFlightRegistry, JobQueue, JobStats, JobStatsSnapshot,
    RefreshJob, RefreshJobConfig, RefreshWorkerPool,
};

//! Cassiopeia API Server Entry Point
//!
//! Loads configuration, opens the cache store, starts the refresh workers
//! and the cache sweeper, then serves HTTP until Ctrl-C, draining in-flight requests before exit.

use std::sync::Arc;

use cassiopeia_api::server::{ctrl_c_signal, serve_until};
use cassiopeia_api::telemetry::{init_tracing, TelemetryConfig};
use cassiopeia_api::{
    cache_sweeper_task, create_api_router, open_cache_store, ApiConfig, ApiError, ApiResult,
    AppState, CacheSettings, JobQueue, RefreshJobConfig, RefreshWorkerPool,
};
use cassiopeia_provider::{
    AstronomyClient, AstronomyConfig, CachingProvider, EventDataProvider, RemoteProvider,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    // Fail fast on missing credentials or malformed settings.
    let upstream_config = AstronomyConfig::from_env()?;
    let api_config = ApiConfig::from_env()?;
    let cache_settings = CacheSettings::from_env()?;
    let job_config = RefreshJobConfig::from_env()?;

    let store = open_cache_store(&cache_settings)?;

    let client = AstronomyClient::new(upstream_config)?;
    let provider: Arc<dyn EventDataProvider> = Arc::new(
        CachingProvider::new(RemoteProvider::new(client), Arc::clone(&store))
            .with_ttl(cache_settings.ttl),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (queue, receiver) = JobQueue::channel(&job_config);
    let pool = RefreshWorkerPool::spawn(
        provider,
        queue.clone(),
        receiver,
        &job_config,
        shutdown_rx.clone(),
    );
    let sweeper = tokio::spawn(cache_sweeper_task(
        Arc::clone(&store),
        cache_settings.sweep_interval,
        shutdown_rx,
    ));

    let state = AppState::new(store, queue, api_config.retry_after_secs);
    let app = create_api_router(state, &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting Cassiopeia API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let served = serve_until(listener, app, ctrl_c_signal()).await;

    // Stop background work even if the server itself failed.
    let _ = shutdown_tx.send(true);
    pool.join().await;
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Cache sweeper task panicked");
    }

    tracing::info!("Cassiopeia API server stopped");
    served
}

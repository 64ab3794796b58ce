//! Probes under `/health`
//!
//! `ping` and `live` only prove the process answers. `ready` also round-trips
//! the cache store, since without it every read degrades to `PROCESSING`.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use cassiopeia_storage::CacheStore;
use serde::{Deserialize, Serialize};

use crate::jobs::{JobStats, JobStatsSnapshot};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub cache: CacheHealth,
    pub jobs: JobsHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub status: HealthStatus,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsHealth {
    pub enqueued: u64,
    pub coalesced: u64,
    pub started: u64,
    pub succeeded: u64,
    pub retried: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl From<JobStatsSnapshot> for JobsHealth {
    fn from(s: JobStatsSnapshot) -> Self {
        Self {
            enqueued: s.enqueued,
            coalesced: s.coalesced,
            started: s.started,
            succeeded: s.succeeded,
            retried: s.retried,
            failed: s.failed,
            dropped: s.dropped,
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready: 503 while the cache store errors.
pub async fn readiness(
    State(store): State<Arc<dyn CacheStore>>,
    State(jobs): State<Arc<JobStats>>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let cache = check_cache(store.as_ref()).await;
    let overall = cache.status;

    let response = HealthResponse {
        status: overall,
        message: None,
        details: Some(HealthDetails {
            cache,
            jobs: jobs.snapshot().into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };

    let status_code = match overall {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

async fn check_cache(store: &dyn CacheStore) -> CacheHealth {
    let start = Instant::now();
    let backend = store.backend_name().to_string();

    match store.stats().await {
        Ok(stats) => CacheHealth {
            status: HealthStatus::Healthy,
            backend,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            entry_count: Some(stats.entry_count),
            hit_rate: Some(stats.hit_rate()),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, backend = %backend, "Readiness check: cache store unavailable");
            CacheHealth {
                status: HealthStatus::Unhealthy,
                backend,
                latency_ms: None,
                entry_count: None,
                hit_rate: None,
                error: Some(e.to_string()),
            }
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Health check routes, nested under `/health`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cassiopeia_storage::InMemoryCacheStore;
    use cassiopeia_test_utils::FailingCacheStore;

    #[test]
    fn test_health_response_serialization() -> Result<(), serde_json::Error> {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            message: Some("alive".to_string()),
            details: None,
        };

        let json = serde_json::to_string(&response)?;
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(!json.contains("details"));
        Ok(())
    }

    #[tokio::test]
    async fn test_cache_check_healthy() {
        let health = check_cache(&InMemoryCacheStore::new()).await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.backend, "memory");
        assert_eq!(health.entry_count, Some(0));
        assert!(health.error.is_none());
    }

    #[tokio::test]
    async fn test_cache_check_unhealthy() -> Result<(), serde_json::Error> {
        let health = check_cache(&FailingCacheStore).await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(health.error.is_some());

        let json = serde_json::to_string(&health)?;
        assert!(json.contains("\"status\":\"unhealthy\""));
        assert!(!json.contains("latency_ms"));
        Ok(())
    }

    #[test]
    fn test_job_stats_conversion() {
        let snapshot = JobStatsSnapshot {
            enqueued: 4,
            failed: 1,
            ..Default::default()
        };
        let jobs = JobsHealth::from(snapshot);
        assert_eq!(jobs.enqueued, 4);
        assert_eq!(jobs.failed, 1);
        assert_eq!(jobs.succeeded, 0);
    }
}

//! Prometheus Metrics Definitions
//!
//! Registers the service's counters and histograms in the default registry
//! and exposes them on `/metrics`.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<ApiResult<CassiopeiaMetrics>> = Lazy::new(CassiopeiaMetrics::new);

/// The registered metrics, or `None` if registration failed at startup.
pub fn metrics() -> Option<&'static CassiopeiaMetrics> {
    METRICS.as_ref().ok()
}

/// How a read on the events endpoint was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Completed,
    Processing,
    StoreError,
}

impl ReadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadOutcome::Completed => "completed",
            ReadOutcome::Processing => "processing",
            ReadOutcome::StoreError => "store_error",
        }
    }
}

#[derive(Clone)]
pub struct CassiopeiaMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Events endpoint reads - labels: outcome
    pub events_reads_total: CounterVec,

    /// Refresh job transitions - labels: status
    pub refresh_jobs_total: CounterVec,

    /// Entries removed by the cache sweeper - labels: backend
    pub cache_purged_total: CounterVec,
}

impl CassiopeiaMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "cassiopeia_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "cassiopeia_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            events_reads_total: register_counter_vec!(
                "cassiopeia_events_reads_total",
                "Events endpoint reads by outcome",
                &["outcome"]
            )
            .map_err(|e| registration_error("events_reads_total", e))?,

            refresh_jobs_total: register_counter_vec!(
                "cassiopeia_refresh_jobs_total",
                "Refresh job transitions by status",
                &["status"]
            )
            .map_err(|e| registration_error("refresh_jobs_total", e))?,

            cache_purged_total: register_counter_vec!(
                "cassiopeia_cache_purged_total",
                "Expired cache entries removed by the sweeper",
                &["backend"]
            )
            .map_err(|e| registration_error("cache_purged_total", e))?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_read(&self, outcome: ReadOutcome) {
        self.events_reads_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// `status` is one of `succeeded`, `retried`, `failed`, `dropped`.
    pub fn record_refresh_job(&self, status: &str) {
        self.refresh_jobs_total.with_label_values(&[status]).inc();
    }

    pub fn record_purged(&self, backend: &str, count: u64) {
        self.cache_purged_total
            .with_label_values(&[backend])
            .inc_by(count as f64);
    }
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

/// Handler for GET /metrics.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the registry so an idle process still reports its series.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    fn registered() -> Result<&'static CassiopeiaMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = registered()?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_read_outcomes() -> Result<(), String> {
        let metrics = registered()?;
        let before = metrics
            .events_reads_total
            .with_label_values(&["store_error"])
            .get();
        metrics.record_read(ReadOutcome::StoreError);
        let after = metrics
            .events_reads_total
            .with_label_values(&["store_error"])
            .get();
        assert!(after >= before + 1.0);
        Ok(())
    }

    #[test]
    fn test_record_refresh_and_purge() -> Result<(), String> {
        let metrics = registered()?;
        metrics.record_refresh_job("succeeded");
        metrics.record_refresh_job("failed");
        metrics.record_purged("memory", 3);
        assert!(metrics.cache_purged_total.with_label_values(&["memory"]).get() >= 3.0);
        Ok(())
    }

    #[test]
    fn test_read_outcome_labels() {
        assert_eq!(ReadOutcome::Completed.as_str(), "completed");
        assert_eq!(ReadOutcome::Processing.as_str(), "processing");
        assert_eq!(ReadOutcome::StoreError.as_str(), "store_error");
    }
}

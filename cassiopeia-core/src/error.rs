//! Error types for Cassiopeia operations

use std::time::Duration;
use thiserror::Error;

/// Failures talking to the upstream astronomy service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// A single attempt failed in a way that may succeed on retry
    /// (timeout, connection failure, 5xx, 408, 429).
    #[error("Transient upstream failure: {reason}")]
    Transient { reason: String },

    /// Every attempt failed transiently.
    #[error("Upstream service unavailable after {attempts} attempts: {last_error}")]
    ServiceUnavailable { attempts: u32, last_error: String },

    /// Non-retriable client error (bad credentials, bad parameters).
    #[error("Upstream rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to build upstream request: {reason}")]
    RequestBuild { reason: String },
}

/// Row-level parsing failures for upstream payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
}

/// Cache store failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("Failed to serialize cache value: {reason}")]
    Serialization { reason: String },

    #[error("Corrupted cache entry {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Value {value} for {field} is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Cassiopeia errors.
#[derive(Debug, Clone, Error)]
pub enum AstroError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl AstroError {
    /// Whether another attempt of the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AstroError::Upstream(UpstreamError::Transient { .. })
                | AstroError::Upstream(UpstreamError::ServiceUnavailable { .. })
                | AstroError::Cache(CacheError::StoreUnavailable { .. })
        )
    }

    /// Short machine-friendly label, used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AstroError::Upstream(UpstreamError::Transient { .. }) => "upstream_transient",
            AstroError::Upstream(UpstreamError::ServiceUnavailable { .. }) => {
                "upstream_unavailable"
            }
            AstroError::Upstream(UpstreamError::Rejected { .. }) => "upstream_rejected",
            AstroError::Upstream(UpstreamError::RequestBuild { .. }) => "upstream_request",
            AstroError::Parse(_) => "malformed_row",
            AstroError::Cache(_) => "cache",
            AstroError::Validation(_) => "validation",
            AstroError::Config(_) => "config",
        }
    }
}

/// Result type alias for Cassiopeia operations.
pub type AstroResult<T> = Result<T, AstroError>;

/// Helper for the common "retry after" hint carried on rate-limit responses.
///
/// Values too large for a `Duration` are treated as absent.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

// =============================================================================
// TESTS
// =============================================================================

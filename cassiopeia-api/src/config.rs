//! Environment-driven configuration for the HTTP server and the cache store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use cassiopeia_core::{ConfigError, DEFAULT_CACHE_TTL, DEFAULT_RETRY_AFTER_SECS};

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CACHE_MAX_SIZE_MB, DEFAULT_CACHE_PATH,
    DEFAULT_CACHE_SWEEP_INTERVAL_SECS, DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_PORT,
};

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server configuration: bind address, CORS, client polling hint.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub bind_host: String,
    pub port: u16,

    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Seconds a client is told to wait before polling again.
    pub retry_after_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CASSIOPEIA_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `CASSIOPEIA_API_PORT`: Listen port (default: 3000)
    /// - `CASSIOPEIA_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `CASSIOPEIA_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `CASSIOPEIA_RETRY_AFTER_SECS`: Polling hint for PROCESSING responses (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT").or_else(|| lookup("CASSIOPEIA_API_PORT")) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                field: "PORT".to_string(),
                value: raw.clone(),
                reason: "must be a port number".to_string(),
            })?,
            None => defaults.port,
        };

        let cors_origins = lookup("CASSIOPEIA_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_host: lookup("CASSIOPEIA_API_BIND").unwrap_or(defaults.bind_host),
            port,
            cors_origins,
            cors_max_age_secs: parse_or(
                lookup("CASSIOPEIA_CORS_MAX_AGE_SECS"),
                defaults.cors_max_age_secs,
            ),
            retry_after_secs: parse_or(
                lookup("CASSIOPEIA_RETRY_AFTER_SECS"),
                defaults.retry_after_secs,
            ),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "CASSIOPEIA_API_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Which cache store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    /// Durable LMDB environment on local disk.
    Lmdb,
    /// Process-local map; lost on restart.
    Memory,
}

impl std::str::FromStr for CacheBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lmdb" => Ok(Self::Lmdb),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                field: "CASSIOPEIA_CACHE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected 'lmdb' or 'memory'".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    pub path: PathBuf,
    pub max_size_mb: usize,
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Lmdb,
            path: PathBuf::from(DEFAULT_CACHE_PATH),
            max_size_mb: DEFAULT_CACHE_MAX_SIZE_MB,
            ttl: DEFAULT_CACHE_TTL,
            sweep_interval: Duration::from_secs(DEFAULT_CACHE_SWEEP_INTERVAL_SECS),
        }
    }
}

impl CacheSettings {
    /// Create CacheSettings from environment variables.
    ///
    /// Environment variables:
    /// - `CASSIOPEIA_CACHE_BACKEND`: `lmdb` or `memory` (default: lmdb)
    /// - `CASSIOPEIA_CACHE_PATH`: LMDB directory (default: ./data/cache)
    /// - `CASSIOPEIA_CACHE_MAX_SIZE_MB`: LMDB map size (default: 256)
    /// - `CASSIOPEIA_CACHE_TTL_SECS`: Entry lifetime (default: 7200)
    /// - `CASSIOPEIA_CACHE_SWEEP_INTERVAL_SECS`: Expired-entry sweep period (default: 600)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend = match lookup("CASSIOPEIA_CACHE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.backend,
        };

        let ttl_secs = parse_or(lookup("CASSIOPEIA_CACHE_TTL_SECS"), defaults.ttl.as_secs());
        if ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "CASSIOPEIA_CACHE_TTL_SECS".to_string(),
                value: "0".to_string(),
                reason: "ttl must be positive".to_string(),
            });
        }

        let sweep_secs = parse_or(
            lookup("CASSIOPEIA_CACHE_SWEEP_INTERVAL_SECS"),
            defaults.sweep_interval.as_secs(),
        )
        .max(1);

        Ok(Self {
            backend,
            path: lookup("CASSIOPEIA_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            max_size_mb: parse_or(lookup("CASSIOPEIA_CACHE_MAX_SIZE_MB"), defaults.max_size_mb),
            ttl: Duration::from_secs(ttl_secs),
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }
}

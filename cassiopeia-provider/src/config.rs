//! Upstream astronomy API configuration

use std::time::Duration;

use cassiopeia_core::{ConfigError, RetryConfig};

pub const DEFAULT_BASE_URL: &str = "https://api.astronomyapi.com/api/v2";
pub const DEFAULT_BODY: &str = "Sun";
pub const DEFAULT_USER_AGENT: &str = "Cassiopeia-Project/1.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_BACKOFF_MS: u64 = 200;

/// Connection settings for the astronomy events API.
#[derive(Clone, PartialEq)]
pub struct AstronomyConfig {
    pub app_id: String,
    pub app_secret: String,
    /// API root, e.g. `https://api.astronomyapi.com/api/v2`.
    pub base_url: String,
    /// Celestial body whose events are requested.
    pub body: String,
    pub user_agent: String,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl AstronomyConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            body: DEFAULT_BODY.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Full URL of the body events endpoint.
    pub fn events_url(&self) -> String {
        format!(
            "{}/bodies/events/{}",
            self.base_url.trim_end_matches('/'),
            self.body
        )
    }

    /// Load from process environment variables.
    ///
    /// Environment variables:
    /// - `ASTRONOMY_API_ID`: application id (required)
    /// - `ASTRONOMY_API_SECRET`: application secret (required)
    /// - `ASTRONOMY_API_URL`: API root (default: `https://api.astronomyapi.com/api/v2`)
    /// - `ASTRONOMY_API_TIMEOUT_SECS`: per-attempt timeout (default: 15)
    /// - `ASTRONOMY_API_MAX_ATTEMPTS`: attempts per call (default: 3)
    /// - `ASTRONOMY_API_BACKOFF_MS`: delay between attempts (default: 200)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String, ConfigError> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingRequired {
                    field: name.to_string(),
                })
        };
        let number = |name: &str, default: u64| -> Result<u64, ConfigError> {
            match lookup(name) {
                None => Ok(default),
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: name.to_string(),
                    value: raw.clone(),
                    reason: "expected a non-negative integer".to_string(),
                }),
            }
        };

        let app_id = required("ASTRONOMY_API_ID")?;
        let app_secret = required("ASTRONOMY_API_SECRET")?;
        let base_url = lookup("ASTRONOMY_API_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "ASTRONOMY_API_URL".to_string(),
                value: base_url,
                reason: "must be an http(s) URL".to_string(),
            });
        }

        let timeout = Duration::from_secs(number("ASTRONOMY_API_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?);
        let max_attempts = number(
            "ASTRONOMY_API_MAX_ATTEMPTS",
            u64::from(cassiopeia_core::DEFAULT_UPSTREAM_ATTEMPTS),
        )?
        .clamp(1, 10) as u32;
        let backoff = Duration::from_millis(number("ASTRONOMY_API_BACKOFF_MS", DEFAULT_BACKOFF_MS)?);

        Ok(Self::new(app_id, app_secret)
            .with_base_url(base_url)
            .with_timeout(timeout)
            .with_retry(RetryConfig::fixed(max_attempts, backoff)))
    }
}

impl std::fmt::Debug for AstronomyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AstronomyConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

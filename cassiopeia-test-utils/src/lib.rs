//! Cassiopeia Test Utilities
//!
//! Shared test infrastructure for the Cassiopeia workspace:
//! - Scripted fake providers and failing cache stores
//! - Proptest generators for coordinates and events
//! - Upstream payload fixtures
//! - Assertions over `AstroResult`

pub use cassiopeia_core::{
    AstroError, AstroEvent, AstroResult, CacheError, CacheKey, CacheKeyBuilder, Coordinates,
    ParseError, UpstreamError, ValidationError,
};
pub use cassiopeia_provider::EventDataProvider;
pub use cassiopeia_storage::{CacheStats, CacheStore, InMemoryCacheStore};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

// ============================================================================
// FAKE PROVIDERS
// ============================================================================

/// Provider that replays scripted results and counts its calls.
///
/// Once the script runs out every call returns the fallback, which is either
/// a fixed event list or an exhausted-upstream error.
#[derive(Clone)]
pub struct FakeProvider {
    script: Arc<Mutex<VecDeque<AstroResult<Vec<AstroEvent>>>>>,
    fallback: Option<Vec<AstroEvent>>,
    calls: Arc<AtomicUsize>,
    panics: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl FakeProvider {
    /// Always succeeds with `events`.
    pub fn returning(events: Vec<AstroEvent>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Some(events),
            calls: Arc::new(AtomicUsize::new(0)),
            panics: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    /// Fails with an exhausted-upstream error on every call.
    pub fn failing() -> Self {
        Self {
            fallback: None,
            ..Self::returning(Vec::new())
        }
    }

    /// Queue `count` upstream failures ahead of the fallback result.
    pub fn fail_times(self, count: usize) -> Self {
        if let Ok(mut script) = self.script.try_lock() {
            for _ in 0..count {
                script.push_back(Err(upstream_unavailable()));
            }
        }
        self
    }

    /// Panic inside the next `count` calls before consulting the script.
    pub fn panic_times(self, count: usize) -> Self {
        self.panics.store(count, Ordering::SeqCst);
        self
    }

    /// Queue one explicit result.
    pub fn then(self, result: AstroResult<Vec<AstroEvent>>) -> Self {
        if let Ok(mut script) = self.script.try_lock() {
            script.push_back(result);
        }
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared handle on the call counter, usable after the provider moved.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl EventDataProvider for FakeProvider {
    async fn fetch(
        &self,
        _latitude: f64,
        _longitude: f64,
        _days_ahead: u32,
    ) -> AstroResult<Vec<AstroEvent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .panics
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            panic!("scripted provider panic");
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.script.lock().await.pop_front() {
            Some(result) => result,
            None => match &self.fallback {
                Some(events) => Ok(events.clone()),
                None => Err(upstream_unavailable()),
            },
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// The error a remote provider returns after its last retry.
pub fn upstream_unavailable() -> AstroError {
    UpstreamError::ServiceUnavailable {
        attempts: 3,
        last_error: "HTTP 500 Internal Server Error".to_string(),
    }
    .into()
}

// ============================================================================
// FAILING CACHE STORE
// ============================================================================

/// Store whose every operation reports the backend as unreachable.
#[derive(Debug, Clone, Default)]
pub struct FailingCacheStore;

impl FailingCacheStore {
    fn error() -> AstroError {
        CacheError::StoreUnavailable {
            reason: "cache backend offline".to_string(),
        }
        .into()
    }
}

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn has(&self, _key: &CacheKey) -> AstroResult<bool> {
        Err(Self::error())
    }

    async fn get(&self, _key: &CacheKey) -> AstroResult<Option<Vec<AstroEvent>>> {
        Err(Self::error())
    }

    async fn put(&self, _key: &CacheKey, _value: &[AstroEvent], _ttl: Duration) -> AstroResult<()> {
        Err(Self::error())
    }

    async fn delete(&self, _key: &CacheKey) -> AstroResult<bool> {
        Err(Self::error())
    }

    async fn purge_expired(&self) -> AstroResult<u64> {
        Err(Self::error())
    }

    async fn stats(&self) -> AstroResult<CacheStats> {
        Err(Self::error())
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Cassiopeia types.

    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    pub fn arb_latitude() -> impl Strategy<Value = f64> {
        -90.0f64..=90.0
    }

    pub fn arb_longitude() -> impl Strategy<Value = f64> {
        -180.0f64..=180.0
    }

    pub fn arb_coordinates() -> impl Strategy<Value = Coordinates> {
        (arb_latitude(), arb_longitude()).prop_filter_map("in range", |(lat, lon)| {
            Coordinates::new(lat, lon).ok()
        })
    }

    /// Values that must be rejected as latitude.
    pub fn arb_bad_latitude() -> impl Strategy<Value = f64> {
        prop_oneof![90.0001f64..1.0e6, -1.0e6f64..-90.0001]
    }

    pub fn arb_event() -> impl Strategy<Value = AstroEvent> {
        (
            "[A-Z][a-z]{2,8}",
            prop_oneof![
                Just("Sunrise"),
                Just("Sunset"),
                Just("Partial solar eclipse"),
                Just("General")
            ],
            0i64..4_102_444_800,
        )
            .prop_map(|(body, kind, secs)| {
                let at = Utc
                    .timestamp_opt(secs, 0)
                    .single()
                    .unwrap_or_else(Utc::now);
                AstroEvent::new(
                    format!("{} - {}", body, kind),
                    at,
                    format!("Astronomical event of type {} for body {}.", kind, body),
                    serde_json::Value::Null,
                )
            })
    }

    pub fn arb_events(max: usize) -> impl Strategy<Value = Vec<AstroEvent>> {
        proptest::collection::vec(arb_event(), 0..=max)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built payloads and events for common scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    /// Moscow, the coordinates used throughout the scenarios.
    pub const MOSCOW: (f64, f64) = (55.7558, 37.6173);

    pub fn sunrise_event() -> AstroEvent {
        let at = Utc
            .with_ymd_and_hms(2024, 3, 20, 3, 45, 0)
            .single()
            .unwrap_or_else(Utc::now);
        AstroEvent::new(
            "Sun - Sunrise",
            at,
            "Astronomical event of type Sunrise for body Sun.",
            json!({"type": "sunrise", "rise": "2024-03-20T03:45:00Z"}),
        )
    }

    pub fn eclipse_event() -> AstroEvent {
        let at = Utc
            .with_ymd_and_hms(2024, 4, 8, 18, 17, 0)
            .single()
            .unwrap_or_else(Utc::now);
        AstroEvent::new(
            "Sun - Total solar eclipse",
            at,
            "Astronomical event of type Total solar eclipse for body Sun.",
            json!({
                "type": "total_solar_eclipse",
                "eventHighlights": {"peak": {"date": "2024-04-08T18:17:00Z"}}
            }),
        )
    }

    pub fn sample_events() -> Vec<AstroEvent> {
        vec![sunrise_event(), eclipse_event()]
    }

    /// Upstream body with two good rows and one malformed row.
    pub fn upstream_payload() -> Value {
        json!({
            "data": {
                "table": {
                    "header": ["date"],
                    "rows": [
                        {
                            "entry": {"id": "sun", "name": "Sun"},
                            "cells": [
                                {
                                    "type": "total_solar_eclipse",
                                    "eventHighlights": {
                                        "partialStart": {"date": "2024-04-08T16:40:00Z"},
                                        "peak": {"date": "2024-04-08T18:17:00Z"}
                                    },
                                    "rise": "2024-04-08T11:02:00Z"
                                },
                                {
                                    "type": "sunset",
                                    "set": "2024-04-08T23:55:00Z"
                                }
                            ]
                        },
                        {
                            "entry": {"name": "Moon"},
                            "cells": "not a list"
                        }
                    ]
                }
            }
        })
    }

    /// Upstream body with no rows at all.
    pub fn empty_payload() -> Value {
        json!({"data": {"table": {"rows": []}}})
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over `AstroResult` variants.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &AstroResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_upstream_error<T: std::fmt::Debug>(result: &AstroResult<T>) {
        match result {
            Err(AstroError::Upstream(_)) => {}
            other => panic!("Expected Upstream error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_cache_error<T: std::fmt::Debug>(result: &AstroResult<T>) {
        match result {
            Err(AstroError::Cache(_)) => {}
            other => panic!("Expected Cache error, got: {:?}", other),
        }
    }

    /// Assert a validation failure on the named field.
    #[track_caller]
    pub fn assert_validation_error_on<T: std::fmt::Debug>(result: &AstroResult<T>, field: &str) {
        match result {
            Err(AstroError::Validation(err)) => {
                let found = match err {
                    ValidationError::RequiredFieldMissing { field: f } => f,
                    ValidationError::OutOfRange { field: f, .. } => f,
                    ValidationError::InvalidValue { field: f, .. } => f,
                };
                assert_eq!(found, field, "Validation error on wrong field");
            }
            other => panic!("Expected Validation error on {}, got: {:?}", field, other),
        }
    }

    /// Assert two event lists carry the same names and instants, in order.
    #[track_caller]
    pub fn assert_same_events(left: &[AstroEvent], right: &[AstroEvent]) {
        assert_eq!(left.len(), right.len(), "Event count differs");
        for (a, b) in left.iter().zip(right) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.occurs_at, b.occurs_at);
        }
    }
}

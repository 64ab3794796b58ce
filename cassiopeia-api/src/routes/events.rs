//! Astronomy Events Endpoint
//!
//! `GET /api/astro/events?lat=..&lon=..` answers from the cache only. A hit
//! returns the events; a miss (or an unreachable store) enqueues a refresh
//! job and tells the client to poll again. The upstream API is never called
//! on this path.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use cassiopeia_core::{AstroEvent, Coordinates};
use serde::{Deserialize, Serialize};

use crate::constants::PROCESSING_MESSAGE;
use crate::error::{ApiError, ApiResult};
use crate::jobs::EnqueueOutcome;
use crate::state::AppState;
use crate::telemetry::{metrics, ReadOutcome};

// ============================================================================
// TYPES
// ============================================================================

/// Raw query string. Kept as strings so missing and malformed values get
/// distinct error codes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQueryParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

impl EventsQueryParams {
    pub fn validate(&self) -> ApiResult<Coordinates> {
        let latitude = parse_number("lat", self.lat.as_deref())?;
        let longitude = parse_number("lon", self.lon.as_deref())?;
        Ok(Coordinates::new(latitude, longitude)?)
    }
}

fn parse_number(field: &str, raw: Option<&str>) -> ApiResult<f64> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::missing_field(field))?;
    raw.parse::<f64>()
        .map_err(|_| ApiError::invalid_format(field, "a decimal number"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Completed,
    Processing,
}

/// One event as exposed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventView {
    pub event_name: String,
    /// RFC 3339
    pub event_date: String,
    pub description: String,
}

impl From<&AstroEvent> for EventView {
    fn from(event: &AstroEvent) -> Self {
        Self {
            event_name: event.name.clone(),
            event_date: event.occurs_at.to_rfc3339(),
            description: event.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedResponse {
    pub status: ResultStatus,
    pub data: Vec<EventView>,
}

impl CompletedResponse {
    pub fn from_events(events: &[AstroEvent]) -> Self {
        Self {
            status: ResultStatus::Completed,
            data: events.iter().map(EventView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResponse {
    pub status: ResultStatus,
    pub message: String,
    pub retry_after: u64,
}

impl ProcessingResponse {
    pub fn new(retry_after: u64) -> Self {
        Self {
            status: ResultStatus::Processing,
            message: PROCESSING_MESSAGE.to_string(),
            retry_after,
        }
    }
}

// ============================================================================
// HANDLER
// ============================================================================

/// GET /api/astro/events
pub async fn get_events(
    State(state): State<AppState>,
    Query(params): Query<EventsQueryParams>,
) -> ApiResult<Response> {
    let coords = params.validate()?;
    let key = state
        .keys
        .build_today(coords.latitude, coords.longitude, state.queue.days_ahead());

    match state.store.get(&key).await {
        Ok(Some(events)) => {
            record(ReadOutcome::Completed);
            tracing::debug!(key = %key, events = events.len(), "Serving cached events");
            Ok((StatusCode::OK, Json(CompletedResponse::from_events(&events))).into_response())
        }
        Ok(None) => {
            record(ReadOutcome::Processing);
            Ok(schedule_refresh(&state, coords))
        }
        Err(e) => {
            record(ReadOutcome::StoreError);
            tracing::warn!(
                key = %key,
                error = %e,
                backend = state.store.backend_name(),
                "Cache store unavailable, treating as miss"
            );
            Ok(schedule_refresh(&state, coords))
        }
    }
}

/// Enqueue a refresh and build the 202 response. Enqueue failures are logged
/// only; the client still gets told to retry.
fn schedule_refresh(state: &AppState, coords: Coordinates) -> Response {
    match state.queue.enqueue(coords.latitude, coords.longitude) {
        Ok(EnqueueOutcome::Queued(job_id)) => {
            tracing::info!(
                job_id = %job_id,
                latitude = coords.latitude,
                longitude = coords.longitude,
                "Cache miss, refresh job enqueued"
            );
        }
        Ok(EnqueueOutcome::Coalesced) => {
            tracing::debug!(
                latitude = coords.latitude,
                longitude = coords.longitude,
                "Cache miss, refresh already in flight"
            );
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                latitude = coords.latitude,
                longitude = coords.longitude,
                "Failed to enqueue refresh job"
            );
        }
    }

    let retry_after = state.retry_after_secs;
    (
        StatusCode::ACCEPTED,
        [(header::RETRY_AFTER, retry_after.to_string())],
        Json(ProcessingResponse::new(retry_after)),
    )
        .into_response()
}

fn record(outcome: ReadOutcome) {
    if let Some(m) = metrics() {
        m.record_read(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use proptest::prelude::*;

    fn params(lat: Option<&str>, lon: Option<&str>) -> EventsQueryParams {
        EventsQueryParams {
            lat: lat.map(str::to_string),
            lon: lon.map(str::to_string),
        }
    }

    fn code_of(result: ApiResult<Coordinates>) -> Option<ErrorCode> {
        result.err().map(|e| e.code)
    }

    #[test]
    fn test_valid_params() {
        let coords = params(Some("55.7558"), Some(" 37.6173 "))
            .validate()
            .expect("valid");
        assert_eq!(coords.latitude, 55.7558);
        assert_eq!(coords.longitude, 37.6173);
    }

    #[test]
    fn test_missing_params() {
        assert_eq!(
            code_of(params(None, Some("1")).validate()),
            Some(ErrorCode::MissingField)
        );
        assert_eq!(
            code_of(params(Some("1"), Some("  ")).validate()),
            Some(ErrorCode::MissingField)
        );
    }

    #[test]
    fn test_malformed_params() {
        assert_eq!(
            code_of(params(Some("north"), Some("1")).validate()),
            Some(ErrorCode::InvalidFormat)
        );
        assert_eq!(
            code_of(params(Some("NaN"), Some("1")).validate()),
            Some(ErrorCode::InvalidFormat)
        );
        assert_eq!(
            code_of(params(Some("1"), Some("inf")).validate()),
            Some(ErrorCode::InvalidFormat)
        );
    }

    #[test]
    fn test_out_of_range_params() {
        let err = params(Some("90.5"), Some("0")).validate().err().expect("rejected");
        assert_eq!(err.code, ErrorCode::InvalidRange);
        assert!(err.message.contains("lat"));

        let err = params(Some("0"), Some("-180.01")).validate().err().expect("rejected");
        assert_eq!(err.code, ErrorCode::InvalidRange);
        assert!(err.message.contains("lon"));
    }

    #[test]
    fn test_processing_body_shape() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(ProcessingResponse::new(10))?;
        assert_eq!(json["status"], "PROCESSING");
        assert_eq!(json["retry_after"], 10);
        assert_eq!(json["message"], PROCESSING_MESSAGE);
        Ok(())
    }

    #[test]
    fn test_completed_body_shape() -> Result<(), serde_json::Error> {
        let events = cassiopeia_test_utils::fixtures::sample_events();
        let json = serde_json::to_value(CompletedResponse::from_events(&events))?;
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["data"][0]["event_name"], "Sun - Sunrise");
        assert_eq!(json["data"][0]["event_date"], "2024-03-20T03:45:00+00:00");
        assert!(json["data"][0].get("raw_payload").is_none());
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_in_range_values_are_accepted(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            let coords = params(Some(&lat.to_string()), Some(&lon.to_string())).validate();
            prop_assert!(coords.is_ok());
        }

        #[test]
        fn prop_out_of_range_latitude_is_rejected(
            lat in cassiopeia_test_utils::generators::arb_bad_latitude(),
        ) {
            let code = code_of(params(Some(&lat.to_string()), Some("0")).validate());
            prop_assert_eq!(code, Some(ErrorCode::InvalidRange));
        }
    }
}

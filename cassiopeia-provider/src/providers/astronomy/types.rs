//! Astronomy API request types

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Query string for `GET /bodies/events/{body}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventsQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// `YYYY-MM-DD`
    pub from_date: String,
    /// `YYYY-MM-DD`
    pub to_date: String,
    /// Observer elevation in metres.
    pub elevation: i32,
    /// Observation time of day, `HH:MM:SS` UTC.
    pub time: String,
}

impl EventsQuery {
    pub fn new(
        latitude: f64,
        longitude: f64,
        from_date: NaiveDate,
        to_date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            from_date: from_date.format("%Y-%m-%d").to_string(),
            to_date: to_date.format("%Y-%m-%d").to_string(),
            elevation: 0,
            time: at.format("%H:%M:%S").to_string(),
        }
    }
}

//! Tolerant parser for the body events payload.
//!
//! Expected shape:
//!
//! ```text
//! { data: { table: { rows: [ { entry: { name }, cells: [ { type, eventHighlights|rise|set: { date } } ] } ] } } }
//! ```
//!
//! Each row is parsed on its own. A malformed row is logged and skipped, never
//! failing the batch. A payload that does not have the shape at all yields no
//! events.

use cassiopeia_core::{AstroEvent, ParseError};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

const UNKNOWN_BODY: &str = "Unknown";
const DEFAULT_EVENT_TYPE: &str = "general";

/// Paths tried in order for the event time.
const DATE_PATHS: &[&[&str]] = &[
    &["eventHighlights", "peak", "date"],
    &["eventHighlights", "partialStart", "date"],
    &["rise", "date"],
    &["set", "date"],
];

/// Events parsed from one payload plus the rows that had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct ParsedEvents {
    pub events: Vec<AstroEvent>,
    pub skipped: Vec<ParseError>,
}

/// Parse every row of `payload`. `now` is the fallback event time.
pub fn parse_events(payload: &Value, now: DateTime<Utc>) -> ParsedEvents {
    let Some(rows) = payload
        .pointer("/data/table/rows")
        .and_then(Value::as_array)
    else {
        tracing::warn!("Unexpected upstream payload shape, no rows to parse");
        return ParsedEvents::default();
    };

    let mut parsed = ParsedEvents::default();
    for (index, row) in rows.iter().enumerate() {
        match parse_row(index, row, now) {
            Ok(events) => parsed.events.extend(events),
            Err(err) => {
                tracing::warn!(row = index, error = %err, "Skipping malformed upstream row");
                parsed.skipped.push(err);
            }
        }
    }
    parsed
}

fn parse_row(index: usize, row: &Value, now: DateTime<Utc>) -> Result<Vec<AstroEvent>, ParseError> {
    let malformed = |reason: &str| ParseError::MalformedRow {
        row: index,
        reason: reason.to_string(),
    };

    let row = row.as_object().ok_or_else(|| malformed("row is not an object"))?;
    let body = row
        .get("entry")
        .and_then(|entry| entry.get("name"))
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_BODY);
    let cells = row
        .get("cells")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("cells missing or not an array"))?;

    cells
        .iter()
        .map(|cell| {
            if !cell.is_object() {
                return Err(malformed("cell is not an object"));
            }
            Ok(build_event(body, cell, now))
        })
        .collect()
}

fn build_event(body: &str, cell: &Value, now: DateTime<Utc>) -> AstroEvent {
    let raw_type = cell
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_EVENT_TYPE);
    let type_name = display_type(raw_type);
    let occurs_at = DATE_PATHS
        .iter()
        .find_map(|path| lookup(cell, path).and_then(parse_timestamp))
        .unwrap_or(now);

    AstroEvent::new(
        format!("{} - {}", body, type_name),
        occurs_at,
        format!("Astronomical event of type {} for body {}.", type_name, body),
        cell.clone(),
    )
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |current, segment| current.get(segment))
        .and_then(Value::as_str)
}

/// `total_solar_eclipse` becomes `Total solar eclipse`.
pub fn display_type(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}

/// RFC 3339 first, then a zone-less timestamp read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

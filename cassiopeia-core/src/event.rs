//! Astronomical event model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One astronomical event parsed from an upstream row cell.
///
/// Immutable once constructed; the raw upstream cell is kept alongside the
/// normalized fields so nothing the upstream sent is lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstroEvent {
    pub name: String,
    pub occurs_at: DateTime<Utc>,
    pub description: String,
    #[serde(default)]
    pub raw_payload: serde_json::Value,
}

impl AstroEvent {
    pub fn new(
        name: impl Into<String>,
        occurs_at: DateTime<Utc>,
        description: impl Into<String>,
        raw_payload: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            occurs_at,
            description: description.into(),
            raw_payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_event_serde_keeps_raw_payload() -> Result<(), serde_json::Error> {
        let occurs_at = Utc
            .with_ymd_and_hms(2024, 4, 8, 18, 17, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom("bad date"))?;
        let event = AstroEvent::new(
            "Sun - Total solar eclipse",
            occurs_at,
            "Astronomical event of type Total solar eclipse for body Sun.",
            json!({"type": "total_solar_eclipse", "obscuration": 1}),
        );

        let json = serde_json::to_string(&event)?;
        let back: AstroEvent = serde_json::from_str(&json)?;
        assert_eq!(back, event);
        assert_eq!(back.raw_payload["obscuration"], 1);
        Ok(())
    }

    #[test]
    fn test_event_missing_raw_payload_defaults_to_null() -> Result<(), serde_json::Error> {
        let event: AstroEvent = serde_json::from_str(
            r#"{"name":"Sun - General","occurs_at":"2024-01-01T00:00:00Z","description":"d"}"#,
        )?;
        assert!(event.raw_payload.is_null());
        Ok(())
    }
}

//! Provider backed by the live astronomy API.

use async_trait::async_trait;
use cassiopeia_core::AstroResult;
use cassiopeia_core::AstroEvent;
use chrono::{Days, Utc};

use super::client::AstronomyClient;
use super::parser::parse_events;
use crate::EventDataProvider;

/// Fetches `days_ahead` days of events starting today (UTC) and parses them.
#[derive(Debug)]
pub struct RemoteProvider {
    client: AstronomyClient,
}

impl RemoteProvider {
    pub fn new(client: AstronomyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventDataProvider for RemoteProvider {
    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        days_ahead: u32,
    ) -> AstroResult<Vec<AstroEvent>> {
        let now = Utc::now();
        let from_date = now.date_naive();
        let to_date = from_date
            .checked_add_days(Days::new(u64::from(days_ahead)))
            .unwrap_or(from_date);

        let payload = self
            .client
            .fetch(latitude, longitude, from_date, to_date)
            .await?;
        let parsed = parse_events(&payload, now);

        tracing::debug!(
            latitude,
            longitude,
            events = parsed.events.len(),
            skipped_rows = parsed.skipped.len(),
            "Parsed upstream events"
        );
        Ok(parsed.events)
    }

    fn name(&self) -> &str {
        "remote"
    }
}

//! Deterministic cache keys for event lookups.
//!
//! A key is a pure function of the rounded coordinates, the look-ahead
//! window and the calendar date. Time of day never participates, so a client
//! polling all day long keeps hitting one slot per rounded position.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default key namespace.
pub const DEFAULT_KEY_PREFIX: &str = "astronomy:events";

/// Decimal places kept for coordinates (~11 m at the equator).
pub const COORDINATE_PRECISION: i32 = 4;

/// An opaque cache key.
///
/// Only [`CacheKeyBuilder`] constructs keys, so every key in the store went
/// through the same rounding rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Builds [`CacheKey`]s in the form
/// `{prefix}:{lat:.4}:{lon:.4}:{days}:{YYYY-MM-DD}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyBuilder {
    prefix: String,
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl CacheKeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn build(
        &self,
        latitude: f64,
        longitude: f64,
        days_ahead: u32,
        reference_date: NaiveDate,
    ) -> CacheKey {
        CacheKey(format!(
            "{}:{:.4}:{:.4}:{}:{}",
            self.prefix,
            round_coordinate(latitude),
            round_coordinate(longitude),
            days_ahead,
            reference_date.format("%Y-%m-%d"),
        ))
    }

    /// Key for the UTC calendar day containing `at`.
    pub fn build_at(
        &self,
        latitude: f64,
        longitude: f64,
        days_ahead: u32,
        at: DateTime<Utc>,
    ) -> CacheKey {
        self.build(latitude, longitude, days_ahead, at.date_naive())
    }

    /// Key for today (UTC).
    pub fn build_today(&self, latitude: f64, longitude: f64, days_ahead: u32) -> CacheKey {
        self.build_at(latitude, longitude, days_ahead, Utc::now())
    }
}

/// Round half away from zero to [`COORDINATE_PRECISION`] places.
///
/// Negative zero is folded into zero so `-0.00001` and `0.00001` share a slot.
pub fn round_coordinate(value: f64) -> f64 {
    let scale = 10f64.powi(COORDINATE_PRECISION);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_key_format() {
        let key = CacheKeyBuilder::default().build(55.75, 37.61, 7, date(2024, 4, 8));
        assert_eq!(key.as_str(), "astronomy:events:55.7500:37.6100:7:2024-04-08");
    }

    #[test]
    fn test_key_rounds_to_four_places() {
        let builder = CacheKeyBuilder::default();
        let key = builder.build(55.751_249, -37.610_051, 7, date(2024, 4, 8));
        assert_eq!(key.as_str(), "astronomy:events:55.7512:-37.6101:7:2024-04-08");
    }

    #[test]
    fn test_negative_zero_collapses() {
        let builder = CacheKeyBuilder::default();
        let a = builder.build(-0.00001, 0.0, 7, date(2024, 1, 1));
        let b = builder.build(0.00001, -0.0, 7, date(2024, 1, 1));
        assert_eq!(a, b);
        assert!(a.as_str().contains(":0.0000:0.0000:"));
    }

    #[test]
    fn test_time_of_day_does_not_matter() {
        let builder = CacheKeyBuilder::default();
        let morning = Utc.with_ymd_and_hms(2024, 4, 8, 0, 0, 1).single().expect("valid");
        let night = Utc.with_ymd_and_hms(2024, 4, 8, 23, 59, 59).single().expect("valid");
        let next_day = Utc.with_ymd_and_hms(2024, 4, 9, 0, 0, 0).single().expect("valid");

        assert_eq!(
            builder.build_at(10.0, 20.0, 7, morning),
            builder.build_at(10.0, 20.0, 7, night)
        );
        assert_ne!(
            builder.build_at(10.0, 20.0, 7, night),
            builder.build_at(10.0, 20.0, 7, next_day)
        );
    }

    #[test]
    fn test_custom_prefix() {
        let key = CacheKeyBuilder::new("test:events").build(1.0, 2.0, 3, date(2030, 12, 31));
        assert_eq!(key.to_string(), "test:events:1.0000:2.0000:3:2030-12-31");
    }

    #[test]
    fn test_days_participate_in_key() {
        let builder = CacheKeyBuilder::default();
        assert_ne!(
            builder.build(1.0, 2.0, 7, date(2024, 1, 1)),
            builder.build(1.0, 2.0, 8, date(2024, 1, 1))
        );
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_date() -> impl Strategy<Value = NaiveDate> {
        (2000i32..2100, 1u32..=12, 1u32..=28)
            .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("valid date"))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn prop_build_is_pure(
            lat in -90.0f64..=90.0,
            lon in -180.0f64..=180.0,
            days in 0u32..60,
            day in arb_date(),
        ) {
            let builder = CacheKeyBuilder::default();
            prop_assert_eq!(
                builder.build(lat, lon, days, day),
                builder.build(lat, lon, days, day)
            );
        }

        #[test]
        fn prop_jitter_below_precision_shares_slot(
            lat_units in -899_999i32..=899_999,
            lon_units in -1_799_999i32..=1_799_999,
            jitter in -0.4f64..=0.4,
            day in arb_date(),
        ) {
            let builder = CacheKeyBuilder::default();
            let lat = lat_units as f64 / 10_000.0;
            let lon = lon_units as f64 / 10_000.0;
            let shifted_lat = (lat_units as f64 + jitter) / 10_000.0;
            let shifted_lon = (lon_units as f64 - jitter) / 10_000.0;
            prop_assert_eq!(
                builder.build(lat, lon, 7, day),
                builder.build(shifted_lat, shifted_lon, 7, day)
            );
        }

        #[test]
        fn prop_distinct_rounded_coordinates_distinct_keys(
            a in -900_000i32..=900_000,
            b in -900_000i32..=900_000,
            lon_units in -1_800_000i32..=1_800_000,
            day in arb_date(),
        ) {
            let builder = CacheKeyBuilder::default();
            let lon = lon_units as f64 / 10_000.0;
            let key_a = builder.build(a as f64 / 10_000.0, lon, 7, day);
            let key_b = builder.build(b as f64 / 10_000.0, lon, 7, day);
            if a == b {
                prop_assert_eq!(key_a, key_b);
            } else {
                prop_assert_ne!(key_a, key_b);
            }
        }

        #[test]
        fn prop_distinct_rounded_longitudes_distinct_keys(
            a in -1_800_000i32..=1_800_000,
            b in -1_800_000i32..=1_800_000,
            day in arb_date(),
        ) {
            let builder = CacheKeyBuilder::default();
            let key_a = builder.build(12.5, a as f64 / 10_000.0, 7, day);
            let key_b = builder.build(12.5, b as f64 / 10_000.0, 7, day);
            prop_assert_eq!(a == b, key_a == key_b);
        }
    }
}

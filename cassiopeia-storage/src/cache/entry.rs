//! Stored cache entry and its on-disk encoding.

use std::time::Duration;

use cassiopeia_core::{AstroEvent, CacheError, CacheKey};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Size of the expiry header preceding the JSON body.
pub const HEADER_LEN: usize = 8;

/// One cached event list.
///
/// Never mutated in place: a refresh replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: Vec<AstroEvent>,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Build an entry that expires `ttl` after `now`.
    pub fn new(key: CacheKey, value: Vec<AstroEvent>, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            key,
            value,
            cached_at: now,
            expires_at: expiry_after(now, ttl),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Format: `[expires_at millis: 8 bytes LE][json entry]`.
    ///
    /// The header lets readers check expiry without decoding the body.
    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        let body = serde_json::to_vec(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.extend_from_slice(&self.expires_at.timestamp_millis().to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        if bytes.len() < HEADER_LEN {
            return Err(CacheError::Corrupted {
                key: String::new(),
                reason: format!("entry is {} bytes, shorter than header", bytes.len()),
            });
        }
        serde_json::from_slice(&bytes[HEADER_LEN..]).map_err(|e| CacheError::Corrupted {
            key: String::new(),
            reason: e.to_string(),
        })
    }
}

/// Read only the expiry header of an encoded entry.
pub fn decode_expiry(bytes: &[u8]) -> Option<DateTime<Utc>> {
    let header: [u8; HEADER_LEN] = bytes.get(..HEADER_LEN)?.try_into().ok()?;
    DateTime::from_timestamp_millis(i64::from_le_bytes(header))
}

/// `now + ttl`, saturating at the largest representable instant.
pub fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cassiopeia_core::CacheKeyBuilder;
    use chrono::NaiveDate;
    use serde_json::json;

    fn key() -> CacheKey {
        let day = NaiveDate::from_ymd_opt(2024, 4, 8).expect("valid date");
        CacheKeyBuilder::default().build(55.75, 37.61, 7, day)
    }

    fn event() -> AstroEvent {
        AstroEvent::new("Sun - Sunrise", Utc::now(), "d", json!({"type": "sunrise"}))
    }

    #[test]
    fn test_encode_decode() -> Result<(), CacheError> {
        let now = Utc::now();
        let entry = CacheEntry::new(key(), vec![event()], Duration::from_secs(60), now);
        let bytes = entry.encode()?;

        let decoded = CacheEntry::decode(&bytes)?;
        assert_eq!(decoded.key, entry.key);
        assert_eq!(decoded.value, entry.value);
        assert_eq!(
            decode_expiry(&bytes).map(|t| t.timestamp_millis()),
            Some(entry.expires_at.timestamp_millis())
        );
        Ok(())
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let entry = CacheEntry::new(key(), vec![], Duration::from_secs(10), now);
        assert!(!entry.is_expired_at(now));
        assert!(!entry.is_expired_at(now + TimeDelta::seconds(9)));
        assert!(entry.is_expired_at(now + TimeDelta::seconds(10)));
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let now = Utc::now();
        let entry = CacheEntry::new(key(), vec![], Duration::ZERO, now);
        assert!(entry.is_expired_at(now));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let now = Utc::now();
        let expires = expiry_after(now, Duration::from_secs(u64::MAX));
        assert_eq!(expires, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_decode_rejects_short_and_garbage() {
        assert!(matches!(
            CacheEntry::decode(&[1, 2, 3]),
            Err(CacheError::Corrupted { .. })
        ));
        let mut bytes = 0i64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"not json");
        assert!(matches!(
            CacheEntry::decode(&bytes),
            Err(CacheError::Corrupted { .. })
        ));
        assert!(decode_expiry(&[0u8; 4]).is_none());
    }
}

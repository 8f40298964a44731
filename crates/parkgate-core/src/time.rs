//! # Timestamps
//!
//! Entry times arrive in more than one shape: RFC 3339 from this client and
//! from newer servers, naive `isoformat()` strings from older clients and
//! servers. Naive values are wall-clock times at the gate and are read in
//! the local time zone.
//!
//! ```text
//!   "2024-03-01T08:30:00Z"          → as given
//!   "2024-03-01T08:30:00+07:00"     → as given
//!   "2024-03-01T08:30:00.123456"    → local time
//!   "2024-03-01 08:30:00"           → local time
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parses an RFC 3339 or naive local timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())?;

    // Inside a DST gap there is no local reading; fall back to UTC.
    Some(
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
    )
}

/// Serde `deserialize_with` helper for [`parse_timestamp`].
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

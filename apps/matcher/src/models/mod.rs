//! Client-side copies of the server-owned records.
//!
//! Decoding tolerates `null` values, missing fields and status labels this
//! client has never seen.

pub mod analysis;
pub mod requirements;
pub mod uploads;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer};

pub type JdId = i64;
pub type CvEntryId = i64;
pub type SessionId = i64;

/// Treats an explicit JSON `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Formats a server timestamp for display. The server emits naive ISO-8601
/// (`2024-05-01T10:22:03.120000`); RFC 3339 is accepted too. Anything else is
/// shown verbatim.
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y-%m-%d %H:%M:%S %:z").to_string();
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => raw.to_string(),
    }
}

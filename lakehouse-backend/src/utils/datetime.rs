//! Timestamp normalization.
//!
//! Backends report times in different shapes: the GraphQL API sends RFC 3339
//! strings, manifests and `auth.json` carry Unix seconds (occasionally
//! milliseconds), and file mtimes come back as `SystemTime`. Everything leaves
//! the backend layer as an RFC 3339 string in UTC.

use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};

/// Formats a UTC timestamp the way every domain object carries it.
pub fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Converts a filesystem timestamp.
pub fn from_system_time(t: SystemTime) -> String {
    to_rfc3339(DateTime::<Utc>::from(t))
}

/// Re-normalizes an RFC 3339 string from any offset to UTC.
///
/// Unparseable input is passed through unchanged.
pub fn normalize(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| to_rfc3339(dt.with_timezone(&Utc)))
        .unwrap_or_else(|_| raw.to_string())
}

/// Unix timestamp, auto-detecting seconds vs. milliseconds.
pub fn parse_unix_timestamp(ts: i64) -> Option<DateTime<Utc>> {
    // Anything above 10^11 is treated as milliseconds.
    if ts > 100_000_000_000 {
        DateTime::from_timestamp_millis(ts)
    } else {
        DateTime::from_timestamp(ts, 0)
    }
}

/// Serde helper: accepts an RFC 3339 string or a Unix timestamp.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        String(String),
        Int(i64),
        Float(f64),
    }

    match Option::<RawTimestamp>::deserialize(deserializer)? {
        Some(RawTimestamp::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| Error::custom(format!("Invalid RFC3339 timestamp: {e}"))),
        Some(RawTimestamp::Int(ts)) => parse_unix_timestamp(ts)
            .map(Some)
            .ok_or_else(|| Error::custom("Invalid Unix timestamp")),
        #[allow(clippy::cast_possible_truncation)]
        Some(RawTimestamp::Float(ts)) => parse_unix_timestamp(ts as i64)
            .map(Some)
            .ok_or_else(|| Error::custom("Invalid Unix timestamp")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_optional")]
        at: Option<DateTime<Utc>>,
    }

    fn parse(json: &str) -> Option<DateTime<Utc>> {
        serde_json::from_str::<Holder>(json).ok().and_then(|h| h.at)
    }

    #[test]
    fn seconds_and_millis_agree() {
        assert_eq!(parse_unix_timestamp(1_700_000_000), parse_unix_timestamp(1_700_000_000_000));
    }

    #[test]
    fn deserializes_all_shapes() {
        let expected = parse_unix_timestamp(1_700_000_000);
        assert_eq!(parse(r#"{"at":"2023-11-14T22:13:20Z"}"#), expected);
        assert_eq!(parse(r#"{"at":1700000000}"#), expected);
        assert_eq!(parse(r#"{"at":1700000000.25}"#), expected);
        assert_eq!(parse(r#"{"at":null}"#), None);
        assert_eq!(parse("{}"), None);
    }

    #[test]
    fn normalize_converts_offsets() {
        assert_eq!(normalize("2024-01-01T02:00:00+02:00"), "2024-01-01T00:00:00Z");
        assert_eq!(normalize("not a date"), "not a date");
    }

    #[test]
    fn formats_without_subseconds() {
        let dt = DateTime::from_timestamp(0, 500_000_000).unwrap_or_default();
        assert_eq!(to_rfc3339(dt), "1970-01-01T00:00:00Z");
    }
}

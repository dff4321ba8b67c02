//! Server timestamps.
//!
//! The backend serialises "no value" as `0001-01-01T00:00:00` instead of
//! omitting the field. That sentinel (and anything unparseable) is never a
//! real calendar date here: it parses to `None` and renders as a placeholder.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The backend's "no value" timestamp.
pub const NO_VALUE_SENTINEL: &str = "0001-01-01T00:00:00";

/// Placeholder for a missing last-run date.
pub const NEVER: &str = "Never";

/// Placeholder for a missing event/step time.
pub const NO_TIME: &str = "—";

/// A wall-clock timestamp as reported by the server.
///
/// Naive strings are kept as-is (they are server-local wall time); strings
/// carrying an offset are converted to local wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Parse a server timestamp. Returns `None` for the sentinel, empty
    /// strings and anything that is not a recognisable date.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with(NO_VALUE_SENTINEL) {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(dt.with_timezone(&Local).naive_local()));
        }

        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(Self)
    }

    /// Build from a UTC instant (client-side clocks).
    pub fn from_utc(at: DateTime<Utc>) -> Self {
        Self(at.with_timezone(&Local).naive_local())
    }

    /// The instant this wall-clock time denotes on this machine.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        Local
            .from_local_datetime(&self.0)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// `HH:MM:SS`
    pub fn time_label(&self) -> String {
        self.0.format("%H:%M:%S").to_string()
    }

    /// `dd/mm/yyyy HH:MM`
    pub fn date_time_label(&self) -> String {
        self.0.format("%d/%m/%Y %H:%M").to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// Render an optional event time, `—` when absent.
pub fn time_label(ts: Option<&Timestamp>) -> String {
    ts.map(Timestamp::time_label)
        .unwrap_or_else(|| NO_TIME.to_string())
}

/// The header's "last run" value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastRun {
    #[default]
    Never,
    At(Timestamp),
}

impl LastRun {
    pub fn parse(raw: &str) -> Self {
        Timestamp::parse(raw).map(Self::At).unwrap_or(Self::Never)
    }

    pub fn label(&self) -> String {
        match self {
            Self::Never => NEVER.to_string(),
            Self::At(ts) => ts.date_time_label(),
        }
    }
}

impl fmt::Display for LastRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Lenient deserializer for optional timestamp fields: non-string values,
/// the sentinel and garbage all become `None` instead of an error.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(Timestamp::parse))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_no_value() {
        assert_eq!(Timestamp::parse(NO_VALUE_SENTINEL), None);
        assert_eq!(Timestamp::parse("0001-01-01T00:00:00.000"), None);
        assert_eq!(Timestamp::parse(""), None);
        assert_eq!(Timestamp::parse("not a date"), None);
    }

    #[test]
    fn test_sentinel_renders_placeholders() {
        assert_eq!(LastRun::parse(NO_VALUE_SENTINEL).label(), "Never");
        assert_eq!(time_label(Timestamp::parse(NO_VALUE_SENTINEL).as_ref()), "—");
    }

    #[test]
    fn test_naive_timestamp_labels() {
        let ts = Timestamp::parse("2025-03-14T09:26:53.589").unwrap();
        assert_eq!(ts.time_label(), "09:26:53");
        assert_eq!(ts.date_time_label(), "14/03/2025 09:26");
        assert_eq!(LastRun::parse("2025-03-14T09:26:53").label(), "14/03/2025 09:26");
    }

    #[test]
    fn test_lenient_deserialize() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "deserialize_lenient")]
            time: Option<Timestamp>,
        }

        let h: Holder = serde_json::from_str(r#"{"time": 42}"#).unwrap();
        assert!(h.time.is_none());
        let h: Holder = serde_json::from_str(r#"{"time": "0001-01-01T00:00:00"}"#).unwrap();
        assert!(h.time.is_none());
        let h: Holder = serde_json::from_str(r#"{}"#).unwrap();
        assert!(h.time.is_none());
        let h: Holder = serde_json::from_str(r#"{"time": "2025-01-02T03:04:05"}"#).unwrap();
        assert_eq!(h.time.unwrap().time_label(), "03:04:05");
    }
}

//! Replication cursor
//!
//! Values are compared as parsed UTC instants, never as raw strings, so
//! `2024-03-15T00:00:00+00:00`, `2024-03-15T00:00:00Z` and `2024-03-15`
//! all land on the same point in time.

use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use tracing::warn;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parse an ISO-8601 timestamp. Offsets are converted to UTC; values
/// without an offset (naive datetimes, bare dates) are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // `+0000` style offsets
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Render an instant as `YYYY-MM-DDTHH:MM:SS[.fff]Z`
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse and re-render a timestamp in the canonical form
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|ts| format_timestamp(&ts))
}

/// Maximum replication-key value seen during one resource pass
#[derive(Debug, Clone)]
pub struct ReplicationCursor {
    key: String,
    max: Option<DateTime<Utc>>,
    observed: u64,
    ignored: u64,
}

impl ReplicationCursor {
    /// Track the field named `key`
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            max: None,
            observed: 0,
            ignored: 0,
        }
    }

    /// The replication key being tracked
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Feed one record. The value is read from `attributes.<key>` first and
    /// from a top-level `<key>` otherwise.
    pub fn observe(&mut self, record: &JsonValue) {
        match record.as_object() {
            Some(object) => self.observe_object(object),
            None => self.ignored += 1,
        }
    }

    /// [`observe`](Self::observe) for a record that is already an object
    pub fn observe_object(&mut self, record: &JsonObject) {
        let value = record
            .get("attributes")
            .and_then(|attrs| attrs.get(&self.key))
            .filter(|v| !v.is_null())
            .or_else(|| record.get(&self.key));

        match value.and_then(JsonValue::as_str) {
            Some(raw) => self.observe_value(raw),
            None => self.ignored += 1,
        }
    }

    /// Feed one raw replication value
    pub fn observe_value(&mut self, raw: &str) {
        let Some(ts) = parse_timestamp(raw) else {
            warn!(key = %self.key, value = raw, "ignoring unparseable replication value");
            self.ignored += 1;
            return;
        };
        self.observed += 1;
        if self.max.map_or(true, |max| ts > max) {
            self.max = Some(ts);
        }
    }

    /// Greatest value seen so far, normalized
    pub fn current_max(&self) -> Option<String> {
        self.max.as_ref().map(format_timestamp)
    }

    /// Number of records that contributed a value
    pub fn observed_count(&self) -> u64 {
        self.observed
    }

    /// Number of records without a usable value
    pub fn ignored_count(&self) -> u64 {
        self.ignored
    }

    /// The bookmark to persist given the `prior` one: the later of the two
    /// when anything was observed, `prior` untouched otherwise. A prior
    /// bookmark that wins is returned as written.
    pub fn bookmark(&self, prior: Option<&str>) -> Option<String> {
        let Some(max) = self.max else {
            return prior.map(ToString::to_string);
        };
        match prior.and_then(parse_timestamp) {
            Some(prior_ts) if prior_ts >= max => prior.map(ToString::to_string),
            _ => Some(format_timestamp(&max)),
        }
    }
}

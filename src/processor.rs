//! JSON processors.
//!
//! A processor looks at one string leaf of a JSON document and either leaves
//! it alone (`None`) or supplies a replacement value. The client runs its
//! outbound chain over request bodies before every attempt and its inbound
//! chain over the body of the successful response before decoding.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};

/// A transformation applied to every string leaf of a JSON document.
///
/// Closures of type `Fn(&str) -> Option<Value>` implement this trait.
///
/// # Examples
///
/// ```
/// use rebound::processor::{apply_processors, JsonProcessor};
/// use serde_json::{json, Value};
/// use std::sync::Arc;
///
/// let upper: Arc<dyn JsonProcessor> = Arc::new(|s: &str| {
///     s.starts_with("id-").then(|| Value::String(s.to_uppercase()))
/// });
///
/// let out = apply_processors(json!({"a": ["id-1", "x"]}), &[upper]);
/// assert_eq!(out, json!({"a": ["ID-1", "x"]}));
/// ```
pub trait JsonProcessor: Send + Sync {
    /// Returns a replacement for `value`, or `None` to keep it unchanged.
    fn process(&self, value: &str) -> Option<Value>;
}

impl<F> JsonProcessor for F
where
    F: Fn(&str) -> Option<Value> + Send + Sync,
{
    fn process(&self, value: &str) -> Option<Value> {
        self(value)
    }
}

/// Runs `processors` in order over every string leaf of `value`.
///
/// Each processor sees the output of the previous one. A processor that
/// replaces a string with a non-string value ends the chain for that leaf.
pub fn apply_processors(value: Value, processors: &[Arc<dyn JsonProcessor>]) -> Value {
    if processors.is_empty() {
        return value;
    }
    match value {
        Value::String(s) => process_leaf(s, processors),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| apply_processors(item, processors))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, apply_processors(item, processors)))
                .collect(),
        ),
        other => other,
    }
}

fn process_leaf(original: String, processors: &[Arc<dyn JsonProcessor>]) -> Value {
    let mut current = Value::String(original);
    for processor in processors {
        let Value::String(s) = &current else {
            break;
        };
        if let Some(replacement) = processor.process(s) {
            current = replacement;
        }
    }
    current
}

static ISO_DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d{1,9})?(?:Z|[+-]\d{2}:?\d{2})?$",
    )
    .expect("static ISO-8601 pattern is valid")
});

/// Recognizes ISO-8601 date-time strings and normalizes them to UTC.
///
/// A string is first matched against the ISO-8601 shape and then parsed as a
/// calendar date, so impossible dates such as `2024-13-01T00:00:00Z` are left
/// untouched. Recognized strings are rewritten as canonical RFC 3339 UTC
/// timestamps, which deserialize directly into `chrono::DateTime<Utc>`.
/// Strings without an offset are read as UTC.
///
/// # Examples
///
/// ```
/// use rebound::processor::{IsoDateProcessor, JsonProcessor};
///
/// let processed = IsoDateProcessor.process("2024-01-01T02:00:00+02:00").unwrap();
/// assert_eq!(processed, "2024-01-01T00:00:00Z");
/// assert!(IsoDateProcessor.process("hello").is_none());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoDateProcessor;

impl IsoDateProcessor {
    /// Parses `value` if it is a valid ISO-8601 date-time.
    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        if !ISO_DATE_TIME.is_match(value) {
            return None;
        }
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Some(parsed.with_timezone(&Utc));
        }
        // Offsets written without a colon, e.g. +0200
        if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

impl JsonProcessor for IsoDateProcessor {
    fn process(&self, value: &str) -> Option<Value> {
        Self::parse(value)
            .map(|parsed| Value::String(parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
    }
}

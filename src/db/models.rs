//! Store boundary models
//!
//! Every record leaving a [`RecordStore`](super::RecordStore) is a
//! [`StoreRecord`] whose identifiers have already been normalized to
//! [`RecordId`], so ids from two different stores compare directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Canonical record identifier
///
/// Opaque object ids (`{"$oid": "..."}`), plain strings and integers all
/// normalize to the same trimmed string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create an id from any string-like value, trimming whitespace.
    pub fn new(id: impl Into<String>) -> Self {
        let id: String = id.into();
        let trimmed = id.trim();
        if trimmed.len() == id.len() {
            RecordId(id)
        } else {
            RecordId(trimmed.to_string())
        }
    }

    /// Normalize a JSON attribute into an id.
    ///
    /// Returns `None` for null, empty strings and non-identifier shapes.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(RecordId::new(s.as_str())),
            Value::Number(n) => Some(RecordId(n.to_string())),
            Value::Object(obj) => obj.get("$oid").and_then(RecordId::from_value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::new(value)
    }
}

// ============================================================================
// Records
// ============================================================================

/// A single record from any collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl StoreRecord {
    pub fn new(id: impl Into<RecordId>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.to_string(), value.into());
        self
    }

    /// Look up an attribute by dotted path (`openai_data.openai_model`).
    pub fn attribute(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.attributes.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Attribute as a normalized id
    pub fn attribute_id(&self, path: &str) -> Option<RecordId> {
        self.attribute(path).and_then(RecordId::from_value)
    }

    /// Attribute as a string slice
    pub fn attribute_str(&self, path: &str) -> Option<&str> {
        self.attribute(path).and_then(Value::as_str)
    }
}

// ============================================================================
// Predicates
// ============================================================================

/// Conjunction of `field == value` predicates over record attributes
///
/// A `null` expectation matches both an explicit null and a missing field.
/// Expected ids match normalized ids, so `"abc"` matches `{"$oid": "abc"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeFilter {
    equals: BTreeMap<String, Value>,
}

impl AttributeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality predicate
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.equals.insert(field.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.equals.iter()
    }

    /// Evaluate the filter against a record
    pub fn matches(&self, record: &StoreRecord) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| value_matches(record.attribute(field), expected))
    }
}

fn value_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) | (Some(Value::Null), Value::Null) => true,
        (None, _) => false,
        (Some(actual), Value::String(_)) if actual.is_object() => {
            match RecordId::from_value(expected) {
                Some(id) => RecordId::from_value(actual).as_ref() == Some(&id),
                None => false,
            }
        }
        (Some(actual), expected) => actual == expected,
    }
}

// ============================================================================
// Time ranges
// ============================================================================

/// Half-open `[start, end)` range over `created_at`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// No time restriction
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *ts >= s) && self.end.map_or(true, |e| *ts < e)
    }
}

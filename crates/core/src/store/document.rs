use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::errors::CoreError;

/// Field map of a stored document.
pub type Fields = BTreeMap<String, Value>;

/// Body key that mirrors the storage key inside every document.
pub const ID_FIELD: &str = "id";

/// A typed document value.
///
/// Mirrors the value kinds a managed document database stores, so records
/// can be mapped without losing the distinction between a timestamp and a
/// plain string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
    Map(Fields),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Best-effort timestamp coercion.
    ///
    /// - `Timestamp` passes through
    /// - `String` is tried as RFC 3339, then as a bare `YYYY-MM-DD` (midnight UTC)
    /// - `Integer` is epoch milliseconds
    /// - anything else yields `None`
    pub fn coerce_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::String(s) => {
                let s = s.trim();
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Some(dt.with_timezone(&Utc));
                }
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }
            Value::Integer(ms) => Utc.timestamp_millis_opt(*ms).single(),
            _ => None,
        }
    }

    /// Ordering used by queries.
    ///
    /// Values of the same kind compare naturally; numbers compare across
    /// `Integer`/`Double`; timestamps compare with strings that coerce to a
    /// timestamp. Otherwise values order by kind rank, so a sort never fails.
    pub fn compare(&self, other: &Value) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        }
        match (self, other) {
            (Value::Timestamp(_), _) | (_, Value::Timestamp(_)) => {
                if let (Some(a), Some(b)) = (self.coerce_timestamp(), other.coerce_timestamp()) {
                    return a.cmp(&b);
                }
            }
            (Value::String(a), Value::String(b)) => return a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => return a.cmp(b),
            _ => {}
        }
        self.rank().cmp(&other.rank())
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) | Value::Double(_) => 2,
            Value::Timestamp(_) => 3,
            Value::String(_) => 4,
            Value::Array(_) => 5,
            Value::Map(_) => 6,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A stored document: its key plus a flat field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Build a document, duplicating the key into the body as `id`.
    pub fn new(id: impl Into<String>, mut fields: Fields) -> Self {
        let id = id.into();
        fields.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        Self { id, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Apply a partial update: supplied fields replace, others stay.
    pub fn merge(&mut self, updates: Fields) {
        for (k, v) in updates {
            if k == ID_FIELD {
                continue;
            }
            self.fields.insert(k, v);
        }
    }

    // ── Typed accessors used by record mapping ─────────────────────

    pub fn require_str(&self, field: &str) -> Result<&str, CoreError> {
        self.get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| self.missing(field, "string"))
    }

    pub fn optional_str(&self, field: &str) -> Option<String> {
        self.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn require_f64(&self, field: &str) -> Result<f64, CoreError> {
        self.get(field)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.missing(field, "number"))
    }

    /// Numeric field that defaults to zero when absent or null.
    pub fn f64_or_zero(&self, field: &str) -> f64 {
        self.get(field).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn require_timestamp(&self, field: &str) -> Result<DateTime<Utc>, CoreError> {
        self.get(field)
            .and_then(Value::coerce_timestamp)
            .ok_or_else(|| self.missing(field, "timestamp"))
    }

    pub fn optional_timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get(field).and_then(Value::coerce_timestamp)
    }

    fn missing(&self, field: &str, expected: &str) -> CoreError {
        CoreError::Deserialization(format!(
            "document {}: field '{field}' missing or not a {expected}",
            self.id
        ))
    }
}

//! Mapping between [`Value`] and the managed store's REST value encoding.
//!
//! Every value travels as a single-key object naming its kind, e.g.
//! `{"stringValue": "Market"}` or `{"integerValue": "150"}` (64-bit integers
//! are string-encoded on the wire).

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value as Json};

use crate::errors::CoreError;

use super::document::{Document, Fields, Value};

pub fn encode_value(value: &Value) -> Json {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Integer(i) => json!({ "integerValue": i.to_string() }),
        Value::Double(d) => json!({ "doubleValue": d }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
        }
        Value::Array(items) => {
            let values: Vec<Json> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

pub fn encode_fields(fields: &Fields) -> Json {
    let map: Map<String, Json> = fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    Json::Object(map)
}

pub fn decode_value(raw: &Json) -> Result<Value, CoreError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| CoreError::Deserialization(format!("expected typed value, got {raw}")))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| CoreError::Deserialization("empty typed value".into()))?;

    let value = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().ok_or_else(|| bad(kind, inner))?),
        "integerValue" => {
            // Servers send a string; accept a bare number too.
            let parsed = match inner {
                Json::String(s) => s.parse::<i64>().ok(),
                Json::Number(n) => n.as_i64(),
                _ => None,
            };
            Value::Integer(parsed.ok_or_else(|| bad(kind, inner))?)
        }
        "doubleValue" => {
            let parsed = match inner {
                Json::Number(n) => n.as_f64(),
                // NaN / Infinity are sent as strings.
                Json::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            Value::Double(parsed.ok_or_else(|| bad(kind, inner))?)
        }
        "stringValue" | "referenceValue" => {
            Value::String(inner.as_str().ok_or_else(|| bad(kind, inner))?.to_string())
        }
        "timestampValue" => {
            let s = inner.as_str().ok_or_else(|| bad(kind, inner))?;
            let ts = DateTime::parse_from_rfc3339(s).map_err(|_| bad(kind, inner))?;
            Value::Timestamp(ts.with_timezone(&Utc))
        }
        "arrayValue" => {
            let items = match inner.get("values") {
                Some(Json::Array(items)) => items
                    .iter()
                    .map(decode_value)
                    .collect::<Result<Vec<Value>, CoreError>>()?,
                None => Vec::new(),
                Some(other) => return Err(bad(kind, other)),
            };
            Value::Array(items)
        }
        "mapValue" => Value::Map(match inner.get("fields") {
            Some(fields) => decode_fields(fields)?,
            None => Fields::new(),
        }),
        other => {
            return Err(CoreError::Deserialization(format!(
                "unsupported value kind '{other}'"
            )))
        }
    };
    Ok(value)
}

pub fn decode_fields(raw: &Json) -> Result<Fields, CoreError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| CoreError::Deserialization("document fields must be an object".into()))?;
    obj.iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

/// Decode a REST document resource (`{"name": ".../documents/a/b", "fields": {...}}`).
pub fn decode_document(raw: &Json) -> Result<Document, CoreError> {
    let name = raw
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| CoreError::Deserialization("document resource without name".into()))?;
    let id = name.rsplit('/').next().unwrap_or(name).to_string();
    let fields = match raw.get("fields") {
        Some(fields) => decode_fields(fields)?,
        None => Fields::new(),
    };
    Ok(Document { id, fields })
}

fn bad(kind: &str, inner: &Json) -> CoreError {
    CoreError::Deserialization(format!("malformed {kind}: {inner}"))
}

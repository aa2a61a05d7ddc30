//! Value type definitions for livesel.
//!
//! This module defines the `Value` enum which represents any value a query
//! execution can return in a row cell.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// A value that can appear in a result row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit unsigned integer (unsigned BIGINT columns)
    UInt64(u64),
    /// 64-bit floating point
    Float64(f64),
    /// UTF-8 string
    String(String),
    /// DateTime stored as Unix timestamp in milliseconds
    DateTime(i64),
    /// Binary data
    Bytes(Vec<u8>),
    /// JSON document (object, array or scalar)
    Json(serde_json::Value),
}

impl Value {
    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for values that render as structured data in identity
    /// keys: JSON objects and arrays, and binary blobs.
    pub fn is_structured(&self) -> bool {
        match self {
            Value::Bytes(_) => true,
            Value::Json(doc) => doc.is_object() || doc.is_array(),
            _ => false,
        }
    }

    /// Converts this value into its canonical JSON form.
    ///
    /// Dates become `{"$date": <ms>}` and binary data becomes
    /// `{"$binary": <base64>}`. Object keys come out lexicographically ordered,
    /// so two equal values always serialize to the same text.
    pub fn to_canonical_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => json!(b),
            Value::Int64(i) => json!(i),
            Value::UInt64(u) => json!(u),
            Value::Float64(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => json!(s),
            Value::DateTime(ms) => json!({ "$date": ms }),
            Value::Bytes(bytes) => json!({ "$binary": BASE64.encode(bytes) }),
            Value::Json(doc) => doc.clone(),
        }
    }

    /// Converts this value into a JSON form tagged with its type.
    ///
    /// Unlike the canonical form, distinct values never render the same: a
    /// `DateTime` and a JSON document shaped like `{"$date": ..}` carry
    /// different tags, and non-finite floats keep their spelling.
    pub fn to_tagged_json(&self) -> serde_json::Value {
        let (tag, body) = match self {
            Value::Null => return json!("Null"),
            Value::Boolean(b) => ("Boolean", json!(b)),
            Value::Int64(i) => ("Int64", json!(i)),
            Value::UInt64(u) => ("UInt64", json!(u)),
            Value::Float64(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => ("Float64", serde_json::Value::Number(n)),
                None => ("Float64", json!(f.to_string())),
            },
            Value::String(s) => ("String", json!(s)),
            Value::DateTime(ms) => ("DateTime", json!(ms)),
            Value::Bytes(bytes) => ("Bytes", json!(BASE64.encode(bytes))),
            Value::Json(doc) => ("Json", doc.clone()),
        };
        let mut tagged = serde_json::Map::new();
        tagged.insert(tag.to_string(), body);
        serde_json::Value::Object(tagged)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => {
                // Handle NaN comparison
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            _ => false,
        }
    }
}

/// Default string rendering, used for scalar identity keys.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int64(i) => write!(f, "{}", i),
            Value::UInt64(u) => write!(f, "{}", u),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::DateTime(ms) => write!(f, "{}", ms),
            Value::Bytes(_) | Value::Json(_) => write!(f, "{}", self.to_canonical_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

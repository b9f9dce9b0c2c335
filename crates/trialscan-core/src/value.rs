//! Untyped field values.
//!
//! Model output is loosely typed JSON. Every value is mapped onto
//! [`FieldValue`] at the boundary so that type checks inspect an explicit
//! tag instead of relying on coercion.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// A single value in an extracted record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Key missing or JSON `null`
    Absent,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<FieldValue>),
    Object(BTreeMap<String, FieldValue>),
}

/// The runtime tag of a [`FieldValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Absent,
    Bool,
    Integer,
    Float,
    String,
    List,
    Object,
}

impl ValueKind {
    /// JSON-flavoured name used in violation reasons.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Absent => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::List => "array",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FieldValue {
    /// Convert a JSON value.
    ///
    /// Integral numbers become [`FieldValue::Integer`]; every other number
    /// (including `120.0`) becomes [`FieldValue::Float`]. Non-negative
    /// integers above `i64::MAX` are clamped.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => FieldValue::Absent,
            JsonValue::Bool(b) => FieldValue::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::Integer(i64::try_from(u).unwrap_or(i64::MAX))
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => FieldValue::String(s.clone()),
            JsonValue::Array(items) => {
                FieldValue::List(items.iter().map(FieldValue::from_json).collect())
            }
            JsonValue::Object(map) => FieldValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Absent => ValueKind::Absent,
            FieldValue::Bool(_) => ValueKind::Bool,
            FieldValue::Integer(_) => ValueKind::Integer,
            FieldValue::Float(_) => ValueKind::Float,
            FieldValue::String(_) => ValueKind::String,
            FieldValue::List(_) => ValueKind::List,
            FieldValue::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Absent, a blank string, or an empty object.
    pub fn is_empty_equivalent(&self) -> bool {
        match self {
            FieldValue::Absent => true,
            FieldValue::String(s) => s.trim().is_empty(),
            FieldValue::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Numeric view of integers and floats. Booleans are not numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Object(map) => Some(map),
            _ => None,
        }
    }
}

impl From<&JsonValue> for FieldValue {
    fn from(value: &JsonValue) -> Self {
        FieldValue::from_json(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

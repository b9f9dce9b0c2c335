//! Extracted records.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::value::FieldValue;

pub(crate) static ABSENT: FieldValue = FieldValue::Absent;

/// Errors that can occur when building a record.
///
/// These are caller faults, not data-quality findings: anything that is
/// key-value data becomes a [`Record`], however malformed its fields are.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("Failed to parse record JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// One extraction result: field name to value.
///
/// No schema is enforced here. Unknown fields are kept and ignored by the
/// validator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON value.
    ///
    /// Fails only when `value` is not a JSON object.
    pub fn from_json(value: &JsonValue) -> Result<Self, RecordError> {
        match value {
            JsonValue::Object(map) => Ok(map
                .iter()
                .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                .collect()),
            other => Err(RecordError::NotAnObject {
                found: json_kind(other),
            }),
        }
    }

    /// Parse a record from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, RecordError> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_json(&value)
    }

    /// Set a field, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Look up a field. Missing keys read as [`FieldValue::Absent`].
    pub fn get(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&ABSENT)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl TryFrom<&JsonValue> for Record {
    type Error = RecordError;

    fn try_from(value: &JsonValue) -> Result<Self, Self::Error> {
        Record::from_json(value)
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_becomes_record() {
        let record = Record::from_json(&json!({
            "title": "X",
            "sample_size": 120,
            "notes": ["extra"]
        }))
        .unwrap();

        assert_eq!(record.len(), 3);
        assert_eq!(record.get("title"), &FieldValue::from("X"));
        assert_eq!(record.get("sample_size"), &FieldValue::Integer(120));
    }

    #[test]
    fn test_missing_key_reads_absent() {
        let record = Record::new().with("title", "X");
        assert!(record.get("population").is_absent());
        assert!(!record.contains("population"));
    }

    #[test]
    fn test_scalars_are_structural_faults() {
        for value in [json!(null), json!(3), json!("record"), json!([1, 2]), json!(true)] {
            let result = Record::from_json(&value);
            assert!(
                matches!(result, Err(RecordError::NotAnObject { .. })),
                "expected structural fault for {}",
                value
            );
        }
    }

    #[test]
    fn test_fault_names_the_kind_found() {
        let err = Record::from_json(&json!([1])).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_from_json_str_rejects_garbage() {
        assert!(matches!(
            Record::from_json_str("{not json"),
            Err(RecordError::JsonError(_))
        ));
        assert!(Record::from_json_str(r#"{"title": "X"}"#).is_ok());
    }
}

//! Search documents.
//!
//! A [`Document`] is the flat key/value shape submitted to the search index.
//! It is produced once by the mapper and never mutated afterwards: re-indexing
//! the same record produces a fresh document that replaces the old one.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single field value inside a document.
///
/// Large on-chain quantities (wei amounts, difficulty) do not fit the numeric
/// variants and are carried as [`FieldValue::Text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
    Object(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Render the value as JSON.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Unsigned(u) => Value::from(*u),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    /// Text view of the value, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Unsigned(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Unsigned(u64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Text(value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

/// A flat key/value document ready for indexing.
///
/// The document key is also stored under the descriptor's key field so the
/// index body is self-describing.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    key: String,
    fields: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Create a document, writing `key` under `key_field`.
    pub fn new(
        key_field: &str,
        key: impl Into<String>,
        mut fields: BTreeMap<String, FieldValue>,
    ) -> Self {
        let key = key.into();
        fields.insert(key_field.to_string(), FieldValue::Text(key.clone()));
        Self { key, fields }
    }

    /// The stable document key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// All fields, including the key field.
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Number of fields, including the key field.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render the document body as a JSON object.
    pub fn to_json(&self) -> Value {
        let body: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Value::Object(body)
    }
}

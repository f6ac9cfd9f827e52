//! Loosely typed request payloads.
//!
//! A payload maps field names to [`FieldValue`]s. Operations never match on the
//! raw values; they go through the typed accessors on [`Payload`], which turn a
//! type mismatch into an `InvalidType` validation error.

use crate::error::RequestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A single payload value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    /// Whole numbers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
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

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Field name to value mapping carried by every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, FieldValue>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for clients and tests.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Whether the key is present at all, even with a null value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn present(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    /// Reads an integer. Whole-number floats are accepted.
    ///
    /// Numbers too large or too small for an `i64` are bound errors, not type
    /// errors, so the caller sees the same code as for any other oversized
    /// amount.
    pub fn integer(&self, key: &str, name: &str) -> Result<Option<i64>, RequestError> {
        match self.present(key) {
            None => Ok(None),
            Some(FieldValue::Integer(value)) => Ok(Some(*value)),
            Some(FieldValue::Unsigned(value)) => Err(above_i64(name, Value::from(*value))),
            Some(FieldValue::Float(value)) if value.is_finite() && value.fract() == 0.0 => {
                // i64::MAX as f64 rounds up to 2^63, which is already out of range.
                if *value >= i64::MAX as f64 {
                    Err(above_i64(name, Value::from(*value)))
                } else if *value < i64::MIN as f64 {
                    Err(RequestError::BelowMinimum {
                        name: name.to_string(),
                        value: Value::from(*value),
                        minimum: Value::from(i64::MIN),
                    })
                } else {
                    Ok(Some(*value as i64))
                }
            }
            Some(_) => Err(invalid_type(name, "integer")),
        }
    }

    pub fn boolean(&self, key: &str, name: &str) -> Result<Option<bool>, RequestError> {
        match self.present(key) {
            None => Ok(None),
            Some(FieldValue::Bool(value)) => Ok(Some(*value)),
            Some(_) => Err(invalid_type(name, "boolean")),
        }
    }

    pub fn string(&self, key: &str, name: &str) -> Result<Option<String>, RequestError> {
        match self.present(key) {
            None => Ok(None),
            Some(FieldValue::Text(value)) => Ok(Some(value.clone())),
            Some(_) => Err(invalid_type(name, "string")),
        }
    }

    /// Reads a list of strings into a set, dropping duplicates.
    pub fn string_set(
        &self,
        key: &str,
        name: &str,
    ) -> Result<Option<BTreeSet<String>>, RequestError> {
        match self.present(key) {
            None => Ok(None),
            Some(FieldValue::List(values)) => values
                .iter()
                .map(|value| match value {
                    FieldValue::Text(text) => Ok(text.clone()),
                    _ => Err(invalid_type(name, "list of strings")),
                })
                .collect::<Result<BTreeSet<_>, _>>()
                .map(Some),
            Some(_) => Err(invalid_type(name, "list of strings")),
        }
    }
}

fn above_i64(name: &str, value: Value) -> RequestError {
    RequestError::AboveMaximum {
        name: name.to_string(),
        value,
        maximum: Value::from(i64::MAX),
    }
}

fn invalid_type(name: &str, expected: &'static str) -> RequestError {
    RequestError::InvalidType {
        name: name.to_string(),
        expected,
    }
}

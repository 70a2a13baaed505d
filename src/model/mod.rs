//! Record and row types shared by the backend, the flattener and the writers.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{BackendError, Result};

/// One search hit: an identifier plus its ordered, possibly nested source.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Document identifier
    pub id: String,
    /// Document type, when the backend keeps one
    pub doc_type: Option<String>,
    /// Source fields in the order the backend stored them
    pub source: Map<String, Value>,
}

impl Record {
    /// Create a record without a document type
    pub fn new(id: impl Into<String>, source: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            doc_type: None,
            source,
        }
    }

    /// Build a record from a search hit or a bare source object
    ///
    /// Hits are objects carrying `_source` with optional `_id` and `_type`.
    /// Anything else that is an object is taken as the source itself and
    /// receives `fallback_id`.
    ///
    /// # Arguments
    /// * `value` - Parsed JSON line
    /// * `fallback_id` - Identifier used when the hit carries no `_id`
    ///
    /// # Returns
    /// * `Result<Record>` - The record, or an error for non-object input
    pub fn from_hit(value: Value, fallback_id: &str) -> Result<Self> {
        let Value::Object(mut object) = value else {
            return Err(BackendError::QueryFailed(
                "document is not a JSON object".to_string(),
            )
            .into());
        };

        match object.remove("_source") {
            Some(Value::Object(source)) => {
                let id = match object.get("_id") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => fallback_id.to_string(),
                };
                let doc_type = match object.get("_type") {
                    Some(Value::String(s)) => Some(s.clone()),
                    _ => None,
                };
                Ok(Self {
                    id,
                    doc_type,
                    source,
                })
            }
            Some(_) => Err(BackendError::QueryFailed(
                "_source is not a JSON object".to_string(),
            )
            .into()),
            None => Ok(Self::new(fallback_id, object)),
        }
    }
}

/// A scalar cell value, tagged so writers can branch on type
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldValue {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    #[default]
    Null,
}

impl FieldValue {
    /// Convert a non-object JSON value into a cell
    ///
    /// Arrays are not expanded; they are kept as their compact JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Number(n) => FieldValue::Number(n.clone()),
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Null => FieldValue::Null,
            Value::Array(_) | Value::Object(_) => FieldValue::String(value.to_string()),
        }
    }

    /// Convert back into a JSON value
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Number(n) => Value::Number(n.clone()),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Null => Value::Null,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

/// Flattened record: dotted paths to scalar cells, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct FlatRow {
    entries: Vec<(String, FieldValue)>,
    positions: HashMap<String, usize>,
}

impl FlatRow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a cell; returns false and keeps the earlier value when the
    /// path is already present.
    pub fn insert(&mut self, path: String, value: FieldValue) -> bool {
        if self.positions.contains_key(&path) {
            return false;
        }
        self.positions.insert(path.clone(), self.entries.len());
        self.entries.push((path, value));
        true
    }

    pub fn get(&self, path: &str) -> Option<&FieldValue> {
        self.positions.get(path).map(|&i| &self.entries[i].1)
    }

    /// Move a cell out, leaving `Null` behind
    pub fn take(&mut self, path: &str) -> Option<FieldValue> {
        let i = *self.positions.get(path)?;
        Some(std::mem::take(&mut self.entries[i].1))
    }

    /// Paths in flatten order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A record projected onto the export's column schema
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRow {
    /// Identifier of the source record
    pub id: String,
    /// One value per schema column, in schema order
    pub values: Vec<FieldValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_hit() {
        let hit = json!({"_id": 7, "_type": "item", "_source": {"aaa": "x"}});
        let record = Record::from_hit(hit, "1").unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.doc_type.as_deref(), Some("item"));
        assert_eq!(record.source.get("aaa"), Some(&json!("x")));
    }

    #[test]
    fn test_record_from_bare_object() {
        let record = Record::from_hit(json!({"aaa": 1}), "42").unwrap();
        assert_eq!(record.id, "42");
        assert!(record.doc_type.is_none());
        assert!(Record::from_hit(json!([1, 2]), "1").is_err());
    }

    #[test]
    fn test_field_value_from_json() {
        assert_eq!(FieldValue::from_json(&json!("a")), FieldValue::from("a"));
        assert_eq!(FieldValue::from_json(&json!(3)), FieldValue::from(3));
        assert_eq!(FieldValue::from_json(&json!(true)), FieldValue::Bool(true));
        assert_eq!(FieldValue::from_json(&json!(null)), FieldValue::Null);
        assert_eq!(
            FieldValue::from_json(&json!([1, "b"])),
            FieldValue::String("[1,\"b\"]".to_string())
        );
    }

    #[test]
    fn test_flat_row_keeps_first_value() {
        let mut row = FlatRow::default();
        assert!(row.insert("a.b".into(), FieldValue::from(1)));
        assert!(!row.insert("a.b".into(), FieldValue::from(2)));
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("a.b"), Some(&FieldValue::from(1)));
        assert_eq!(row.take("a.b"), Some(FieldValue::from(1)));
        assert_eq!(row.get("a.b"), Some(&FieldValue::Null));
        assert_eq!(row.take("missing"), None);
    }
}

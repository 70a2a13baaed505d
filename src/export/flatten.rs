//! Record flattening
//!
//! Nested objects are walked depth-first in source order and every scalar
//! leaf is emitted under its dotted path (`eee.ggg`). The resulting key
//! order seeds the inferred column schema, so traversal order matters.

use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{FieldValue, FlatRow, Record};

/// Flatten one record into a dot-keyed row
pub fn flatten(record: &Record) -> FlatRow {
    let mut row = FlatRow::with_capacity(record.source.len());
    flatten_object(&record.source, None, &mut row);
    row
}

fn flatten_object(object: &Map<String, Value>, prefix: Option<&str>, row: &mut FlatRow) {
    for (key, value) in object {
        let path = match prefix {
            Some(parent) => format!("{parent}.{key}"),
            None => key.clone(),
        };

        match value {
            Value::Object(child) => flatten_object(child, Some(&path), row),
            scalar => {
                if !row.insert(path, FieldValue::from_json(scalar)) {
                    debug!("Duplicate flattened path for key '{}' ignored", key);
                }
            }
        }
    }
}

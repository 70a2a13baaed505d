//! Column schema for one export
//!
//! A schema is either declared by the caller (`fl=aaa,eee.ggg`) or inferred
//! from the first flattened record. It is frozen once built: fields that only
//! appear in later records get no column.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{RequestError, Result};
use crate::model::{FieldValue, FlatRow};

/// Ordered, deduplicated list of output columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    columns: Vec<String>,
}

impl ColumnSchema {
    /// Build an explicit schema from a comma-separated field list
    ///
    /// Names are trimmed and kept in the given order. A repeated name keeps
    /// its first position.
    ///
    /// # Arguments
    /// * `list` - Field list such as `aaa,eee.ggg`
    ///
    /// # Returns
    /// * `Result<ColumnSchema>` - Schema, or a bad request for empty names
    pub fn parse_field_list(list: &str) -> Result<Self> {
        if list.trim().is_empty() {
            return Err(RequestError::MalformedFieldList("field list is empty".to_string()).into());
        }

        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for (position, raw) in list.split(',').enumerate() {
            let name = raw.trim();
            if name.is_empty() {
                return Err(RequestError::MalformedFieldList(format!(
                    "empty field name at position {}",
                    position + 1
                ))
                .into());
            }
            if name.starts_with('.') || name.ends_with('.') || name.contains("..") {
                return Err(RequestError::MalformedFieldList(format!(
                    "invalid field path '{name}'"
                ))
                .into());
            }
            if seen.insert(name.to_string()) {
                columns.push(name.to_string());
            } else {
                debug!("Ignoring repeated field '{}' in field list", name);
            }
        }

        Ok(Self { columns })
    }

    /// Infer a schema from the keys of a flattened record
    pub fn infer(row: &FlatRow) -> Self {
        Self {
            columns: row.keys().map(str::to_string).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    /// Project a flattened row onto this schema
    ///
    /// Columns missing from the row become `Null`; row keys outside the
    /// schema are dropped.
    pub fn project(&self, mut row: FlatRow) -> Vec<FieldValue> {
        self.columns
            .iter()
            .map(|column| row.take(column).unwrap_or_default())
            .collect()
    }
}

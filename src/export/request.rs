//! Export request parsing
//!
//! Turns the raw call parameters (`format`, `fl`, request body) into an
//! immutable [`ExportRequest`]. Every validation error is raised here, before
//! a cursor is opened.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;

use crate::backend::CursorRequest;
use crate::error::{DataFormatError, RequestError, Result};

use super::schema::ColumnSchema;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Delimited text, one quoted line per row
    Csv,
    /// Bulk-style JSON: an action line followed by the row object
    Json,
    /// Single-sheet spreadsheet workbook
    Xls,
}

impl ExportFormat {
    /// Format tag as accepted in the `format` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xls => "xls",
        }
    }

    /// MIME type of the produced byte stream
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/x-ndjson; charset=utf-8",
            ExportFormat::Xls => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    /// File extension for downloads
    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xls => "xlsx",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = DataFormatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "xls" => Ok(ExportFormat::Xls),
            other => Err(RequestError::UnknownFormat(other.to_string()).into()),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One export call, validated and frozen
#[derive(Debug, Clone)]
pub struct ExportRequest {
    index: String,
    doc_type: Option<String>,
    format: ExportFormat,
    fields: Option<ColumnSchema>,
    query: Option<Value>,
    sort: Option<Value>,
}

impl ExportRequest {
    /// Create a request for the whole index with an inferred schema
    pub fn new(index: impl Into<String>, format: ExportFormat) -> Result<Self> {
        let index = index.into();
        if index.trim().is_empty() {
            return Err(RequestError::MissingIndex.into());
        }
        Ok(Self {
            index,
            doc_type: None,
            format,
            fields: None,
            query: None,
            sort: None,
        })
    }

    /// Build a request from call parameters
    ///
    /// # Arguments
    /// * `index` - Target index from the request path
    /// * `doc_type` - Optional document type from the request path
    /// * `params` - Query-string parameters (`format`, `fl`)
    /// * `body` - Optional request body with `query` and `sort`
    ///
    /// # Returns
    /// * `Result<ExportRequest>` - Validated request or a bad request error
    pub fn from_params(
        index: &str,
        doc_type: Option<&str>,
        params: &HashMap<String, String>,
        body: Option<&str>,
    ) -> Result<Self> {
        let format = match params.get("format") {
            Some(tag) => tag.parse()?,
            None => return Err(RequestError::UnknownFormat(String::new()).into()),
        };

        let mut request = Self::new(index, format)?;
        if let Some(doc_type) = doc_type.filter(|t| !t.is_empty()) {
            request = request.with_doc_type(doc_type);
        }
        if let Some(fl) = params.get("fl") {
            request = request.with_fields(fl)?;
        }
        if let Some(body) = body {
            request = request.with_body(body)?;
        }
        Ok(request)
    }

    /// Restrict the export to a document type
    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Use an explicit column list
    pub fn with_fields(mut self, field_list: &str) -> Result<Self> {
        self.fields = Some(ColumnSchema::parse_field_list(field_list)?);
        Ok(self)
    }

    /// Attach a query payload of the form `{"query": {...}, "sort": [...]}`
    ///
    /// A blank body means match-all in backend order.
    pub fn with_body(mut self, body: &str) -> Result<Self> {
        if body.trim().is_empty() {
            return Ok(self);
        }

        let parsed: Value = serde_json::from_str(body)
            .map_err(|e| RequestError::MalformedQuery(format!("invalid JSON: {e}")))?;
        let Value::Object(mut payload) = parsed else {
            return Err(RequestError::MalformedQuery(
                "request body must be a JSON object".to_string(),
            )
            .into());
        };

        match payload.remove("query") {
            Some(query @ Value::Object(_)) => self.query = Some(query),
            Some(Value::Null) | None => {}
            Some(_) => {
                return Err(RequestError::MalformedQuery(
                    "'query' must be a JSON object".to_string(),
                )
                .into());
            }
        }

        match payload.remove("sort") {
            Some(Value::Null) | None => {}
            Some(sort @ (Value::String(_) | Value::Array(_) | Value::Object(_))) => {
                self.sort = Some(sort)
            }
            Some(_) => {
                return Err(RequestError::MalformedQuery(
                    "'sort' must be a string, object or array".to_string(),
                )
                .into());
            }
        }

        Ok(self)
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Explicit schema, if the caller supplied a field list
    pub fn fields(&self) -> Option<&ColumnSchema> {
        self.fields.as_ref()
    }

    pub fn query(&self) -> Option<&Value> {
        self.query.as_ref()
    }

    pub fn sort(&self) -> Option<&Value> {
        self.sort.as_ref()
    }

    /// Cursor parameters forwarded to the search backend
    pub fn cursor_request(&self, batch_size: usize, keep_alive: Duration) -> CursorRequest {
        CursorRequest {
            index: self.index.clone(),
            doc_type: self.doc_type.clone(),
            query: self.query.clone(),
            sort: self.sort.clone(),
            batch_size,
            keep_alive,
        }
    }
}

//! Bulk JSON writer for export operations
//!
//! Each row becomes two lines: an `index` action naming the target index,
//! type and document id, then the row as a flat JSON object keyed by the
//! dotted column names. The output can be replayed as a bulk ingest payload.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::error::Result;
use crate::model::ProjectedRow;

use super::super::schema::ColumnSchema;
use super::{FormatWriter, flush_sink, write_bytes};

/// Writer for bulk-action JSON lines
pub struct BulkJsonWriter<W> {
    sink: W,
    index: String,
    doc_type: Option<String>,
    columns: Vec<String>,
    written: u64,
    bytes: u64,
}

impl<W> BulkJsonWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a new bulk JSON writer
    ///
    /// # Arguments
    /// * `sink` - Output byte sink
    /// * `index` - Index named in every action line
    /// * `doc_type` - Optional type named in every action line
    pub fn new(sink: W, index: &str, doc_type: Option<&str>) -> Self {
        Self {
            sink,
            index: index.to_string(),
            doc_type: doc_type.map(str::to_string),
            columns: Vec::new(),
            written: 0,
            bytes: 0,
        }
    }

    /// Recover the sink
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn action_line(&self, id: &str) -> Value {
        let mut target = Map::new();
        target.insert("_index".to_string(), json!(self.index));
        if let Some(doc_type) = &self.doc_type {
            target.insert("_type".to_string(), json!(doc_type));
        }
        target.insert("_id".to_string(), json!(id));
        json!({ "index": target })
    }

    fn source_line(&self, row: &ProjectedRow) -> Value {
        let source: Map<String, Value> = self
            .columns
            .iter()
            .zip(&row.values)
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect();
        Value::Object(source)
    }
}

#[async_trait]
impl<W> FormatWriter for BulkJsonWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_header(&mut self, schema: &ColumnSchema) -> Result<()> {
        // no header line; keys are carried by every record
        self.columns = schema.columns().to_vec();
        Ok(())
    }

    async fn write_row(&mut self, row: &ProjectedRow) -> Result<()> {
        let mut lines = serde_json::to_string(&self.action_line(&row.id))?;
        lines.push('\n');
        lines.push_str(&serde_json::to_string(&self.source_line(row))?);
        lines.push('\n');

        write_bytes(&mut self.sink, lines.as_bytes()).await?;
        self.bytes += lines.len() as u64;
        self.written += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        flush_sink(&mut self.sink).await?;
        debug!(
            "Finalized bulk JSON output ({} rows, {} bytes)",
            self.written, self.bytes
        );
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.written
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

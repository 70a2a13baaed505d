//! CSV writer for export operations
//!
//! Every header name and every non-numeric value is wrapped in double quotes
//! with inner quotes doubled; numbers are written bare in their canonical
//! form. Rows are separated by `\n` and written to the sink one at a time.

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::error::Result;
use crate::model::{FieldValue, ProjectedRow};

use super::super::schema::ColumnSchema;
use super::{FormatWriter, flush_sink, write_bytes};

const DELIMITER: char = ',';
const QUOTE: char = '"';

/// Writer for CSV format
pub struct CsvWriter<W> {
    sink: W,
    /// Reused line buffer, holds at most one row
    line: String,
    written: u64,
    bytes: u64,
}

impl<W> CsvWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a new CSV writer
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            line: String::new(),
            written: 0,
            bytes: 0,
        }
    }

    /// Recover the sink
    pub fn into_inner(self) -> W {
        self.sink
    }

    async fn emit_line(&mut self) -> Result<()> {
        self.line.push('\n');
        write_bytes(&mut self.sink, self.line.as_bytes()).await?;
        self.bytes += self.line.len() as u64;
        self.line.clear();
        Ok(())
    }

    /// Append a quoted value, doubling inner quotes
    fn push_quoted(line: &mut String, value: &str) {
        line.push(QUOTE);
        for c in value.chars() {
            if c == QUOTE {
                line.push(QUOTE);
            }
            line.push(c);
        }
        line.push(QUOTE);
    }

    fn push_value(line: &mut String, value: &FieldValue) {
        match value {
            FieldValue::Number(n) => line.push_str(&n.to_string()),
            FieldValue::String(s) => Self::push_quoted(line, s),
            FieldValue::Bool(b) => Self::push_quoted(line, if *b { "true" } else { "false" }),
            FieldValue::Null => Self::push_quoted(line, ""),
        }
    }
}

#[async_trait]
impl<W> FormatWriter for CsvWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_header(&mut self, schema: &ColumnSchema) -> Result<()> {
        if schema.is_empty() {
            debug!("Empty schema, no CSV header written");
            return Ok(());
        }
        for (i, name) in schema.iter().enumerate() {
            if i > 0 {
                self.line.push(DELIMITER);
            }
            Self::push_quoted(&mut self.line, name);
        }
        self.emit_line().await?;
        debug!("Wrote CSV header: {} columns", schema.len());
        Ok(())
    }

    async fn write_row(&mut self, row: &ProjectedRow) -> Result<()> {
        for (i, value) in row.values.iter().enumerate() {
            if i > 0 {
                self.line.push(DELIMITER);
            }
            Self::push_value(&mut self.line, value);
        }
        self.emit_line().await?;
        self.written += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        flush_sink(&mut self.sink).await?;
        debug!("Finalized CSV output ({} rows, {} bytes)", self.written, self.bytes);
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.written
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

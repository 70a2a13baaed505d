//! Format writers for export operations
//!
//! Every writer consumes the same feed: the column schema once, then one
//! projected row at a time, then a final call to finish the output. Writers
//! target any async byte sink, so the same code serves files, sockets and
//! in-memory buffers.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::ExportConfig;
use crate::error::{ExecutionError, Result};
use crate::model::ProjectedRow;

use super::request::{ExportFormat, ExportRequest};
use super::schema::ColumnSchema;

pub mod bulk;
pub mod csv;
pub mod xls;

pub use bulk::BulkJsonWriter;
pub use csv::CsvWriter;
pub use xls::XlsWriter;

/// Trait for writing projected rows in one output encoding
#[async_trait]
pub trait FormatWriter: Send {
    /// Accept the column schema and emit any header or preamble
    ///
    /// Called exactly once, before the first row. The schema may be empty
    /// when an inferred-schema export matched no records.
    async fn write_header(&mut self, schema: &ColumnSchema) -> Result<()>;

    /// Write one row whose values follow the schema order
    async fn write_row(&mut self, row: &ProjectedRow) -> Result<()>;

    /// Finish the output (serialize buffered containers, flush the sink)
    async fn finalize(&mut self) -> Result<()>;

    /// Number of rows written so far
    fn rows_written(&self) -> u64;

    /// Number of bytes handed to the sink so far
    fn bytes_written(&self) -> u64;
}

/// Create the writer for a request's format
///
/// # Arguments
/// * `request` - Export request (format, index and type for bulk framing)
/// * `config` - Export settings (sheet name)
/// * `sink` - Output byte sink
///
/// # Returns
/// * `Box<dyn FormatWriter>` - Writer for the requested format
pub fn create_writer<W>(
    request: &ExportRequest,
    config: &ExportConfig,
    sink: W,
) -> Box<dyn FormatWriter>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    match request.format() {
        ExportFormat::Csv => Box::new(CsvWriter::new(sink)),
        ExportFormat::Json => Box::new(BulkJsonWriter::new(
            sink,
            request.index(),
            request.doc_type(),
        )),
        ExportFormat::Xls => Box::new(XlsWriter::new(sink, &config.sheet_name)),
    }
}

/// Write bytes to the sink, mapping failures to a write error
pub(crate) async fn write_bytes<W>(sink: &mut W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    sink.write_all(bytes)
        .await
        .map_err(|e| ExecutionError::WriteFailed(e.to_string()).into())
}

/// Flush the sink, mapping failures to a write error
pub(crate) async fn flush_sink<W>(sink: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    sink.flush()
        .await
        .map_err(|e| ExecutionError::WriteFailed(format!("Failed to flush output: {e}")).into())
}

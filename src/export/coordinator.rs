//! Export coordinator for orchestrating export operations
//!
//! Brings together the cursor, the flattener, the column schema and a format
//! writer:
//!
//! 1. Open a cursor for the request
//! 2. Fetch batches until the cursor is exhausted
//! 3. Flatten each record, fix the schema on the first one, project, write
//! 4. Finalize the writer
//! 5. Release the cursor, on every exit path

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::SearchBackend;
use crate::config::ExportConfig;
use crate::error::{ExecutionError, Result};
use crate::model::{ProjectedRow, Record};

use super::cursor::CursorGuard;
use super::flatten::flatten;
use super::progress::ProgressTracker;
use super::request::ExportRequest;
use super::schema::ColumnSchema;
use super::writers::FormatWriter;

/// Result of an export operation
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    /// Number of rows exported
    pub rows_exported: u64,
    /// Number of batches fetched
    pub batches: u32,
    /// Columns of the export, in output order
    pub columns: Vec<String>,
    /// Bytes handed to the output sink
    pub bytes_written: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
}

/// Coordinator for export operations
pub struct ExportCoordinator {
    /// Search backend serving cursors
    backend: Arc<dyn SearchBackend>,
    /// Records per cursor page
    batch_size: usize,
    /// Cursor keep-alive
    keep_alive: Duration,
    /// Progress tracker for user feedback
    tracker: ProgressTracker,
    /// Cancellation token for aborting export
    cancel_token: Option<CancellationToken>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    pub fn new(backend: Arc<dyn SearchBackend>, config: &ExportConfig) -> Self {
        Self {
            backend,
            batch_size: config.batch_size.max(1),
            keep_alive: config.keep_alive(),
            tracker: ProgressTracker::hidden(),
            cancel_token: None,
        }
    }

    /// Report progress through the given tracker
    pub fn with_progress(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Set cancellation token for this export operation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Execute the export operation
    ///
    /// The cursor is released before this returns, whether the export
    /// succeeded, failed or was cancelled. A failed release is logged and
    /// never replaces the error that ended the export.
    ///
    /// # Arguments
    /// * `request` - Validated export request
    /// * `writer` - Writer for the requested format
    ///
    /// # Returns
    /// * `Result<ExportSummary>` - Export statistics or error
    pub async fn execute(
        &self,
        request: &ExportRequest,
        writer: &mut dyn FormatWriter,
    ) -> Result<ExportSummary> {
        let start_time = Instant::now();
        info!(
            "Starting {} export of '{}' ({} schema)",
            request.format(),
            request.index(),
            if request.fields().is_some() { "explicit" } else { "inferred" }
        );

        // the open always runs to completion so a created cursor gets a guard
        self.ensure_not_cancelled()?;
        let cursor_request = request.cursor_request(self.batch_size, self.keep_alive);
        let mut cursor = CursorGuard::open(Arc::clone(&self.backend), &cursor_request).await?;

        let outcome = self.drain(&mut cursor, request, writer).await;
        let fetched = cursor.total_fetched();
        let released = cursor.release().await;
        self.tracker.finish();

        let (rows, batches, columns) = match (outcome, released) {
            (Ok(drained), Ok(())) => drained,
            (Ok(drained), Err(e)) => {
                warn!("Export completed but cursor release failed: {}", e);
                drained
            }
            (Err(e), released) => {
                if let Err(release_err) = released {
                    warn!("Cursor release failed after export error: {}", release_err);
                }
                if e.is_cancelled() {
                    info!("Export of '{}' cancelled", request.index());
                }
                return Err(e);
            }
        };

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        let bytes_written = writer.bytes_written();
        info!(
            "Export completed: {} rows, {} bytes, {} ms",
            rows, bytes_written, elapsed_ms
        );
        debug!("Cursor delivered {} records", fetched);

        Ok(ExportSummary {
            rows_exported: rows,
            batches,
            columns,
            bytes_written,
            elapsed_ms,
        })
    }

    /// Stream every batch through the writer and finalize it
    async fn drain(
        &self,
        cursor: &mut CursorGuard,
        request: &ExportRequest,
        writer: &mut dyn FormatWriter,
    ) -> Result<(u64, u32, Vec<String>)> {
        let mut schema: Option<ColumnSchema> = request.fields().cloned();
        let mut header_written = false;
        let mut exported = 0u64;
        let mut batch_count = 0u32;

        while let Some(records) = self.next_batch(cursor).await? {
            batch_count += 1;
            debug!("Received batch #{} of {} records", batch_count, records.len());

            for record in records {
                let flat = flatten(&record);

                let active = schema.get_or_insert_with(|| {
                    let inferred = ColumnSchema::infer(&flat);
                    info!("Inferred {} columns from first record", inferred.len());
                    inferred
                });
                if !header_written {
                    writer.write_header(active).await?;
                    header_written = true;
                }

                let row = ProjectedRow {
                    id: record.id,
                    values: active.project(flat),
                };
                self.ensure_not_cancelled()?;
                writer.write_row(&row).await?;
                exported += 1;
            }

            self.tracker.update(exported);
            if batch_count % 10 == 0 {
                info!(
                    "Progress: {} rows exported ({} batches)",
                    exported, batch_count
                );
            }
        }

        // empty result: explicit schema keeps its header, inferred has no columns
        let schema = schema.unwrap_or_else(|| ColumnSchema::infer(&Default::default()));
        if !header_written {
            debug!("No records matched, writing empty output");
            writer.write_header(&schema).await?;
        }

        debug!("Finalizing output");
        writer.finalize().await?;

        Ok((exported, batch_count, schema.columns().to_vec()))
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        match &self.cancel_token {
            Some(token) if token.is_cancelled() => Err(ExecutionError::Cancelled.into()),
            _ => Ok(()),
        }
    }

    /// Fetch the next batch, giving up as soon as the export is cancelled
    async fn next_batch(&self, cursor: &mut CursorGuard) -> Result<Option<Vec<Record>>> {
        let Some(token) = &self.cancel_token else {
            return cursor.next_batch().await;
        };

        self.ensure_not_cancelled()?;
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ExecutionError::Cancelled.into()),
            batch = cursor.next_batch() => batch,
        }
    }
}

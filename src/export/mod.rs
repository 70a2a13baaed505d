//! Streaming export of search results
//!
//! This module turns a search request into a downloadable file:
//! - Paginated cursor access that never materializes the full result set
//! - Flattening of nested records into dotted columns
//! - Explicit (`fl`) or inferred column schemas
//! - CSV, bulk JSON and spreadsheet output formats
//!
//! # Architecture
//!
//! 1. **CursorGuard**: owns the backend cursor and guarantees its release
//! 2. **flatten / ColumnSchema**: turn records into rows with stable columns
//! 3. **FormatWriter**: encodes rows for one output format
//!
//! These components are orchestrated by the **ExportCoordinator**.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dataformat::backend::MemoryBackend;
//! use dataformat::config::ExportConfig;
//! use dataformat::export::{self, ExportFormat, ExportRequest};
//!
//! # async fn example() -> dataformat::Result<()> {
//! let backend = Arc::new(MemoryBackend::new());
//! backend.load_ndjson("dataset", "dataset.ndjson").await?;
//!
//! let request = ExportRequest::new("dataset", ExportFormat::Csv)?.with_fields("aaa,eee.ggg")?;
//! let file = tokio::fs::File::create("dataset.csv").await?;
//! let summary = export::run(backend, &ExportConfig::default(), &request, file, None).await?;
//! println!("exported {} rows", summary.rows_exported);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::backend::SearchBackend;
use crate::config::ExportConfig;
use crate::error::Result;

pub mod coordinator;
pub mod cursor;
pub mod flatten;
pub mod progress;
pub mod request;
pub mod schema;
pub mod writers;

pub use coordinator::{ExportCoordinator, ExportSummary};
pub use cursor::CursorGuard;
pub use flatten::flatten;
pub use progress::ProgressTracker;
pub use request::{ExportFormat, ExportRequest};
pub use schema::ColumnSchema;
pub use writers::{BulkJsonWriter, CsvWriter, FormatWriter, XlsWriter};

/// Run one export into a sink with the writer matching the request format
///
/// # Arguments
/// * `backend` - Search backend serving the cursor
/// * `config` - Export settings
/// * `request` - Validated export request
/// * `sink` - Output byte sink
/// * `cancel` - Optional token that aborts the export
///
/// # Returns
/// * `Result<ExportSummary>` - Export statistics or error
pub async fn run<W>(
    backend: Arc<dyn SearchBackend>,
    config: &ExportConfig,
    request: &ExportRequest,
    sink: W,
    cancel: Option<CancellationToken>,
) -> Result<ExportSummary>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut writer = writers::create_writer(request, config, sink);
    let mut coordinator = ExportCoordinator::new(backend, config)
        .with_progress(ProgressTracker::new(config.show_progress));
    if let Some(token) = cancel {
        coordinator = coordinator.with_cancellation(token);
    }
    coordinator.execute(request, writer.as_mut()).await
}

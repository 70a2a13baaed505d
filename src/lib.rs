//! Search result export library
//!
//! Exports the result set of a search query as CSV, bulk JSON lines or a
//! spreadsheet, streaming rows from a paginated cursor so that memory stays
//! bounded by the batch size.
//!
//! # Modules
//!
//! - `backend`: Search backend trait and the in-memory implementation
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Export pipeline, schema handling and format writers
//! - `model`: Records, flattened rows and cell values

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod model;

// Re-export commonly used types
pub use config::Config;
pub use error::{DataFormatError, Result};
pub use export::{ExportCoordinator, ExportFormat, ExportRequest, ExportSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

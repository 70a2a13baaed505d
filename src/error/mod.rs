//! Error handling for export operations.
//!
//! Errors are grouped by the stage that raised them:
//! - request validation (reported before any cursor is opened)
//! - the search backend (query execution, cursor paging)
//! - export execution (writers, cancellation)
//! - configuration loading
//!
//! # Example
//!
//! ```rust,no_run
//! use dataformat::error::{Result, RequestError};
//!
//! fn check_format(tag: &str) -> Result<()> {
//!     if tag != "csv" {
//!         return Err(RequestError::UnknownFormat(tag.to_string()).into());
//!     }
//!     Ok(())
//! }
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    BackendError, ConfigError, DataFormatError, ExecutionError, RequestError, Result,
};

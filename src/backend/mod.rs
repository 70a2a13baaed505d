//! Search backend abstraction
//!
//! The export pipeline talks to the search engine only through
//! [`SearchBackend`]: open a cursor over the matching records, page through
//! it, release it. [`memory::MemoryBackend`] is an in-process implementation
//! used by the CLI and the tests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::model::Record;

pub mod memory;
pub mod query;

pub use memory::MemoryBackend;

/// Parameters for opening a cursor
#[derive(Debug, Clone)]
pub struct CursorRequest {
    /// Target index
    pub index: String,
    /// Optional document type restriction
    pub doc_type: Option<String>,
    /// Query clause, `None` for match-all
    pub query: Option<Value>,
    /// Sort clause, forwarded as given
    pub sort: Option<Value>,
    /// Records per page
    pub batch_size: usize,
    /// How long the backend keeps an idle cursor alive
    pub keep_alive: Duration,
}

/// Opaque handle to server-side pagination state
///
/// Not `Clone`: releasing consumes the handle.
#[derive(Debug, PartialEq, Eq)]
pub struct CursorHandle {
    id: String,
}

impl CursorHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CursorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// One page of results
#[derive(Debug, Default)]
pub struct Batch {
    /// Records in backend order
    pub records: Vec<Record>,
    /// Whether another fetch may return more records
    pub more: bool,
}

/// Cursor-based access to a search engine
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Execute the query and open a cursor over its results
    async fn open_cursor(&self, request: &CursorRequest) -> Result<CursorHandle>;

    /// Fetch the next page of the cursor
    async fn fetch_next(&self, cursor: &CursorHandle) -> Result<Batch>;

    /// Release the cursor's server-side state
    async fn release(&self, cursor: CursorHandle) -> Result<()>;
}

//! In-process search backend
//!
//! Keeps indices as ordered record lists. Opening a cursor evaluates the
//! query and sort once and snapshots the matching records; fetches then page
//! through the snapshot. Cursor bookkeeping (open, released, fetch counts) is
//! exposed so callers can verify that every cursor is released exactly once.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BackendError, Result};
use crate::model::Record;

use super::query::{self, Query};
use super::{Batch, CursorHandle, CursorRequest, SearchBackend};

/// Cursor statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStats {
    /// Cursors opened so far
    pub opened: u64,
    /// Cursors released so far
    pub released: u64,
    /// Release calls for unknown or already released cursors
    pub invalid_releases: u64,
    /// Successful fetch calls
    pub fetches: u64,
}

impl CursorStats {
    /// Cursors opened but not yet released
    pub fn outstanding(&self) -> u64 {
        self.opened - self.released
    }
}

struct OpenCursor {
    records: Vec<Record>,
    position: usize,
    batch_size: usize,
    keep_alive: Duration,
    expires_at: Instant,
}

#[derive(Default)]
struct State {
    indices: HashMap<String, Vec<Record>>,
    cursors: HashMap<String, OpenCursor>,
    stats: CursorStats,
    fetch_attempts: u64,
    fail_fetch_at: Option<u64>,
}

/// Search backend holding its data in memory
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to an index, creating the index if needed
    pub async fn insert(&self, index: &str, record: Record) {
        let mut state = self.state.lock().await;
        state.indices.entry(index.to_string()).or_default().push(record);
    }

    /// Append many records to an index
    pub async fn insert_all(&self, index: &str, records: impl IntoIterator<Item = Record>) {
        let mut state = self.state.lock().await;
        state
            .indices
            .entry(index.to_string())
            .or_default()
            .extend(records);
    }

    /// Number of records stored in an index
    pub async fn count(&self, index: &str) -> usize {
        let state = self.state.lock().await;
        state.indices.get(index).map_or(0, Vec::len)
    }

    /// Load newline-delimited JSON into an index
    ///
    /// Each non-blank line is either a search hit (`{"_id", "_type",
    /// "_source"}`) or a bare source object; bare objects are numbered by
    /// their line position.
    ///
    /// # Arguments
    /// * `index` - Target index
    /// * `path` - NDJSON file to read
    ///
    /// # Returns
    /// * `Result<usize>` - Number of records loaded
    pub async fn load_ndjson(&self, index: &str, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let mut records = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line).map_err(|e| {
                BackendError::QueryFailed(format!(
                    "{}:{}: invalid JSON: {}",
                    path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            records.push(Record::from_hit(value, &(line_no + 1).to_string())?);
        }

        let loaded = records.len();
        self.insert_all(index, records).await;
        info!("Loaded {} records from {} into '{}'", loaded, path.display(), index);
        Ok(loaded)
    }

    /// Make the n-th fetch (1-based, counted across all cursors) fail
    pub async fn fail_fetch_at(&self, attempt: u64) {
        self.state.lock().await.fail_fetch_at = Some(attempt);
    }

    /// Snapshot of cursor bookkeeping
    pub async fn stats(&self) -> CursorStats {
        self.state.lock().await.stats
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn open_cursor(&self, request: &CursorRequest) -> Result<CursorHandle> {
        let query = Query::parse(request.query.as_ref())?;
        let sort = query::parse_sort(request.sort.as_ref())?;

        let mut state = self.state.lock().await;
        let Some(records) = state.indices.get(&request.index) else {
            return Err(BackendError::IndexNotFound(request.index.clone()).into());
        };

        let mut matched: Vec<Record> = records
            .iter()
            .filter(|r| match (&request.doc_type, &r.doc_type) {
                (Some(wanted), Some(actual)) => wanted == actual,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        if !sort.is_empty() {
            matched.sort_by(|a, b| query::compare_records(a, b, &sort));
        }

        let id = Uuid::new_v4().to_string();
        debug!(
            "Opened cursor {} on '{}': {} matching records",
            id,
            request.index,
            matched.len()
        );
        state.cursors.insert(
            id.clone(),
            OpenCursor {
                records: matched,
                position: 0,
                batch_size: request.batch_size.max(1),
                keep_alive: request.keep_alive,
                expires_at: Instant::now() + request.keep_alive,
            },
        );
        state.stats.opened += 1;

        Ok(CursorHandle::new(id))
    }

    async fn fetch_next(&self, cursor: &CursorHandle) -> Result<Batch> {
        let mut state = self.state.lock().await;
        state.fetch_attempts += 1;
        if state.fail_fetch_at == Some(state.fetch_attempts) {
            warn!("Injected failure on fetch #{}", state.fetch_attempts);
            return Err(BackendError::QueryFailed(format!(
                "injected failure on fetch #{}",
                state.fetch_attempts
            ))
            .into());
        }

        let now = Instant::now();
        let Some(open) = state.cursors.get_mut(cursor.id()) else {
            return Err(BackendError::CursorNotFound(cursor.id().to_string()).into());
        };
        if now > open.expires_at {
            return Err(BackendError::CursorExpired(cursor.id().to_string()).into());
        }
        open.expires_at = now + open.keep_alive;

        let end = (open.position + open.batch_size).min(open.records.len());
        let records = open.records[open.position..end].to_vec();
        open.position = end;
        let more = end < open.records.len();

        state.stats.fetches += 1;
        Ok(Batch { records, more })
    }

    async fn release(&self, cursor: CursorHandle) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.cursors.remove(cursor.id()).is_none() {
            state.stats.invalid_releases += 1;
            return Err(BackendError::CursorNotFound(cursor.id().to_string()).into());
        }
        state.stats.released += 1;
        debug!("Released cursor {}", cursor);
        Ok(())
    }
}

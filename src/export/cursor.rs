//! Scoped cursor ownership for export operations
//!
//! [`CursorGuard`] owns one backend cursor for the lifetime of an export and
//! pages through it batch by batch. The cursor is released exactly once:
//! explicitly through [`CursorGuard::release`], or, if the guard is dropped
//! first (the export future was cancelled), by a release task spawned on the
//! current runtime.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{CursorHandle, CursorRequest, SearchBackend};
use crate::error::Result;
use crate::model::Record;

/// Exclusive owner of a backend cursor
pub struct CursorGuard {
    backend: Arc<dyn SearchBackend>,
    handle: Option<CursorHandle>,
    total_fetched: u64,
    exhausted: bool,
}

impl CursorGuard {
    /// Open a cursor on the backend
    ///
    /// # Arguments
    /// * `backend` - Search backend serving the cursor
    /// * `request` - Index, query, sort and page size
    ///
    /// # Returns
    /// * `Result<Self>` - Guard owning the open cursor
    pub async fn open(backend: Arc<dyn SearchBackend>, request: &CursorRequest) -> Result<Self> {
        let handle = backend.open_cursor(request).await?;
        debug!("Opened cursor {} on '{}'", handle, request.index);
        Ok(Self {
            backend,
            handle: Some(handle),
            total_fetched: 0,
            exhausted: false,
        })
    }

    /// Fetch the next batch of records
    ///
    /// # Returns
    /// * `Result<Option<Vec<Record>>>` - Next non-empty batch, or None once exhausted
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Record>>> {
        if self.exhausted {
            return Ok(None);
        }
        let Some(handle) = self.handle.as_ref() else {
            return Ok(None);
        };

        let batch = self.backend.fetch_next(handle).await?;
        if !batch.more {
            self.exhausted = true;
        }

        if batch.records.is_empty() {
            self.exhausted = true;
            debug!("Cursor exhausted after {} records", self.total_fetched);
            return Ok(None);
        }

        self.total_fetched += batch.records.len() as u64;
        debug!(
            "Fetched batch of {} records (total: {})",
            batch.records.len(),
            self.total_fetched
        );
        Ok(Some(batch.records))
    }

    /// Records fetched so far
    pub fn total_fetched(&self) -> u64 {
        self.total_fetched
    }

    /// Release the cursor
    ///
    /// Consumes the guard, so the cursor cannot be used afterwards.
    pub async fn release(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => {
                let id = handle.id().to_string();
                self.backend.release(handle).await?;
                info!(
                    "Released cursor {} after fetching {} records",
                    id, self.total_fetched
                );
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        debug!("CursorGuard dropped without explicit release, releasing {}", handle);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let backend = Arc::clone(&self.backend);
                runtime.spawn(async move {
                    let id = handle.id().to_string();
                    if let Err(e) = backend.release(handle).await {
                        warn!("Failed to release cursor {}: {}", id, e);
                    }
                });
            }
            Err(_) => warn!("No runtime available to release cursor {}", handle),
        }
    }
}

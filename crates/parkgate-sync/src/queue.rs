//! # Shared Queue
//!
//! The offline queue and ticket counter behind the one lock every queue
//! operation takes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Queue Lock Discipline                             │
//! │                                                                         │
//! │  EntryProcessor ──enqueue──┐                                           │
//! │                            │     ┌───────────────────────────────┐     │
//! │  SyncManager ──load_all────┼────►│ Mutex<QueueState>             │     │
//! │              ──remove──────┤     │   OfflineQueue                │     │
//! │                            │     │   TicketIdAllocator           │     │
//! │  Diagnostics ──inspect─────┘     └──────────────┬────────────────┘     │
//! │                                                 │ spawn_blocking       │
//! │                                                 ▼                      │
//! │                                  offline_data.json / offline_counter   │
//! │                                                                         │
//! │  The lock is never held across a network call.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use parkgate_core::{EntryRecord, EntryRequest};
use parkgate_store::{
    AppendOutcome, OfflineQueue, QueueInspection, StoreError, TicketIdAllocator,
};

use crate::error::SyncResult;

struct QueueState {
    queue: OfflineQueue,
    allocator: TicketIdAllocator,
}

/// Cloneable handle to the gate's offline queue.
#[derive(Clone)]
pub struct SharedQueue {
    state: Arc<Mutex<QueueState>>,
    path: PathBuf,
}

impl std::fmt::Debug for SharedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedQueue")
            .field("path", &self.path)
            .finish()
    }
}

impl SharedQueue {
    /// Opens the queue at `path` and loads its ticket counter.
    ///
    /// Reads a few small files; call at startup.
    pub fn open(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let path = path.into();
        let queue = OfflineQueue::open(&path);
        let allocator = TicketIdAllocator::open(queue.counter_path(), &queue)?;

        Ok(SharedQueue {
            state: Arc::new(Mutex::new(QueueState { queue, allocator })),
            path,
        })
    }

    /// Path of the queue file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `f` on the blocking pool while holding the queue lock.
    async fn with_state<F, T>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce(&mut QueueState) -> SyncResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = self.state.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || f(&mut *guard)).await?
    }

    /// Assigns an offline ticket number and appends the record.
    pub async fn enqueue(
        &self,
        request: EntryRequest,
        entry_time: DateTime<Utc>,
    ) -> SyncResult<(EntryRecord, AppendOutcome)> {
        self.with_state(move |state| {
            // A corrupt queue is about to be quarantined; the counter alone
            // still guarantees a fresh number.
            let existing = match state.queue.len() {
                Ok(n) => n,
                Err(e @ StoreError::QueueCorrupt { .. }) => {
                    warn!(error = %e, "Queue unreadable, numbering from the counter");
                    0
                }
                Err(e) => return Err(e.into()),
            };
            let ticket_number = state.allocator.next_offline_id(existing)?;

            let record = EntryRecord::offline(request, ticket_number, entry_time);
            let outcome = state.queue.append(record.clone())?;
            Ok((record, outcome))
        })
        .await
    }

    /// Snapshot of every queued record.
    pub async fn load_all(&self) -> SyncResult<Vec<EntryRecord>> {
        self.with_state(|state| Ok(state.queue.load_all()?)).await
    }

    /// Number of queued records.
    pub async fn len(&self) -> SyncResult<usize> {
        self.with_state(|state| Ok(state.queue.len()?)).await
    }

    /// Removes the given ticket numbers; returns how many records remain.
    pub async fn remove_synced(&self, ticket_numbers: Vec<String>) -> SyncResult<usize> {
        self.with_state(move |state| Ok(state.queue.remove_synced(&ticket_numbers)?))
            .await
    }

    /// Document-level scan for diagnostics.
    pub async fn inspect(&self) -> SyncResult<QueueInspection> {
        self.with_state(|state| Ok(state.queue.inspect()?)).await
    }

    /// Drops documents that fail validation; returns how many were dropped.
    pub async fn retain_valid(&self) -> SyncResult<usize> {
        self.with_state(|state| Ok(state.queue.retain_valid()?)).await
    }

    /// Copies the queue file into `dir` (default: next to the queue).
    pub async fn backup(&self, dir: Option<PathBuf>) -> SyncResult<Option<PathBuf>> {
        self.with_state(move |state| Ok(state.queue.backup(dir.as_deref())?))
            .await
    }

    /// Copies the queue aside, then deletes it. The counter is kept.
    pub async fn backup_and_clear(&self, dir: Option<PathBuf>) -> SyncResult<Option<PathBuf>> {
        self.with_state(move |state| {
            let backup = state.queue.backup(dir.as_deref())?;
            state.queue.clear()?;
            Ok(backup)
        })
        .await
    }
}

//! # Ticket Id Allocator
//!
//! Issues `OFF`-prefixed ticket numbers while the server is unreachable.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      next_offline_id(existing)                          │
//! │                                                                         │
//! │   floor = max(persisted counter, highest OFF seq in queue, existing)   │
//! │   next  = floor + 1                                                    │
//! │                                                                         │
//! │   1. write offline_counter.json  { "last_sequence": next }  (atomic)   │
//! │   2. return "OFF" + next (4 digits minimum)                            │
//! │                                                                         │
//! │   A crash between allocation and queue append leaves a gap in the      │
//! │   sequence, never a duplicate.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter is never reset, not even when the queue is cleared, so a
//! ticket number handed to a driver is never handed out again on this gate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use parkgate_core::ticket::{
    format_offline_ticket, highest_offline_sequence, scan_offline_sequences,
};

use crate::atomic::{read_optional, write_atomic};
use crate::error::{StoreError, StoreResult};
use crate::queue::OfflineQueue;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CounterState {
    last_sequence: u64,
}

/// Persisted monotonic counter behind offline ticket numbers.
#[derive(Debug)]
pub struct TicketIdAllocator {
    path: PathBuf,
    last_sequence: u64,
}

impl TicketIdAllocator {
    /// Loads the counter at `path` and raises it to cover every offline
    /// ticket already in `queue` or in files the queue was quarantined to.
    ///
    /// Files that no longer parse are scanned for `OFF<digits>` tokens. A
    /// corrupt counter is an error because guessing could reissue numbers.
    pub fn open(path: impl Into<PathBuf>, queue: &OfflineQueue) -> StoreResult<Self> {
        let path = path.into();
        let persisted = Self::read_counter(&path)?;

        let queued = match queue.load_all() {
            Ok(records) => {
                highest_offline_sequence(records.iter().map(|r| r.ticket_number.as_str()))
                    .unwrap_or(0)
            }
            Err(e) if e.is_corruption() => {
                warn!(error = %e, "Seeding ticket counter from corrupt queue text");
                Self::scan_file(queue.path())?
            }
            Err(e) => return Err(e),
        };

        let mut quarantined = 0;
        for file in queue.quarantined_files()? {
            quarantined = quarantined.max(Self::scan_file(&file)?);
        }

        let last_sequence = persisted.max(queued).max(quarantined);
        debug!(
            counter = %path.display(),
            persisted,
            queued,
            quarantined,
            last_sequence,
            "Ticket counter loaded"
        );

        Ok(TicketIdAllocator {
            path,
            last_sequence,
        })
    }

    /// Path of the counter file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last sequence handed out (0 when none).
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Allocates the next offline ticket number.
    ///
    /// `existing_count` is the current queue length; the result is always
    /// above it as well as above every number issued before.
    pub fn next_offline_id(&mut self, existing_count: usize) -> StoreResult<String> {
        let floor = self.last_sequence.max(existing_count as u64);
        let next = floor.checked_add(1).ok_or(StoreError::CounterExhausted)?;

        let state = CounterState {
            last_sequence: next,
        };
        write_atomic(&self.path, &serde_json::to_vec_pretty(&state)?)?;
        self.last_sequence = next;

        Ok(format_offline_ticket(next))
    }

    fn scan_file(path: &Path) -> StoreResult<u64> {
        let Some(data) = read_optional(path)? else {
            return Ok(0);
        };
        Ok(scan_offline_sequences(&String::from_utf8_lossy(&data)).unwrap_or(0))
    }

    fn read_counter(path: &Path) -> StoreResult<u64> {
        let Some(data) = read_optional(path)? else {
            return Ok(0);
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(0);
        }

        serde_json::from_slice::<CounterState>(&data)
            .map(|s| s.last_sequence)
            .map_err(|e| StoreError::counter_corrupt(path, e))
    }
}

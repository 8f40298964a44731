//! # Store Error Types
//!
//! Error types for queue and counter persistence.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  std::io::Error / serde_json::Error                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds path and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError (parkgate-sync) ← QueueCorrupt stays distinct               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Operator diagnostics (backup + reset)                                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Queue and counter persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persisted queue cannot be parsed.
    ///
    /// ## When This Occurs
    /// - The file was edited by hand and is no longer valid JSON
    /// - A record lacks a field the typed loader requires
    /// - The disk returned garbage
    ///
    /// Never treated as an empty queue: the operator must back it up and
    /// reset it, or let the next append quarantine it.
    #[error("Offline queue {path} is corrupt: {reason}")]
    QueueCorrupt { path: PathBuf, reason: String },

    /// The persisted ticket counter cannot be parsed.
    #[error("Ticket counter {path} is corrupt: {reason}")]
    CounterCorrupt { path: PathBuf, reason: String },

    /// The ticket counter cannot advance any further.
    #[error("Ticket counter exhausted")]
    CounterExhausted,

    /// Filesystem operation failed.
    ///
    /// ## When This Occurs
    /// - Disk full
    /// - Permissions changed under the running client
    /// - Data directory removed
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding a snapshot failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Creates a QueueCorrupt error.
    pub fn queue_corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StoreError::QueueCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a CounterCorrupt error.
    pub fn counter_corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StoreError::CounterCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the persisted data needs operator attention.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StoreError::QueueCorrupt { .. } | StoreError::CounterCorrupt { .. }
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

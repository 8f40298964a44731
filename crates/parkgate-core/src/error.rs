//! # Error Types
//!
//! Domain-specific error types for parkgate-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  parkgate-core errors (this file)                                      │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  parkgate-store errors (separate crate)                                │
//! │  └── StoreError       - Queue file / counter failures                  │
//! │                                                                         │
//! │  parkgate-sync errors (separate crate)                                 │
//! │  └── SyncError        - Network, config, structural failures           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → operator / logs       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A queued record is missing required fields.
    ///
    /// ## When This Occurs
    /// - The queue file was hand-edited
    /// - The file was written by an older client that omitted fields
    ///
    /// Raised by [`EntryRecord::check`](crate::EntryRecord::check) before a
    /// record is sent in a batch or kept by a queue repair.
    #[error("Malformed record {ticket}: missing {missing:?}")]
    MalformedRecord {
        ticket: String,
        missing: Vec<&'static str>,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when gate input doesn't meet requirements and are
/// raised before anything is sent to the server or written to the queue.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., plate with punctuation).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

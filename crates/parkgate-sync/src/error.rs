//! # Sync Error Types
//!
//! Error types for entry processing and queue draining.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │  Network class  │  │     Structural          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  NetworkUnavail.│  │  QueueCorrupt           │ │
//! │  │  MissingDeviceId│  │  Timeout        │  │  Storage                │ │
//! │  │  InvalidUrl     │  │  ServerRejected │  │                         │ │
//! │  │  ConfigLoad/Save│  │  InvalidResponse│  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Network class:  absorbed (entry goes offline, drain is retried)        │
//! │  Structural:     surfaced to the operator through diagnostics          │
//! │  Validation:     surfaced to the caller of process_entry               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use parkgate_core::{CoreError, ValidationError};
use parkgate_store::StoreError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering every failure of the engine.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid gate configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID.
    #[error("Device ID not configured")]
    MissingDeviceId,

    /// Invalid server URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Network Errors
    // =========================================================================
    /// The server could not be reached (DNS, refused, reset).
    #[error("Server unreachable: {0}")]
    NetworkUnavailable(String),

    /// The request did not complete in time. Holds the limit in milliseconds.
    #[error("Request timeout after {0} ms")]
    Timeout(u64),

    /// The server answered with a non-success status.
    #[error("Server rejected request ({status}): {message}")]
    ServerRejected { status: u16, message: String },

    /// The server answered 2xx but the body could not be understood.
    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    // =========================================================================
    // Structural Errors
    // =========================================================================
    /// The offline queue on disk cannot be read.
    #[error("Offline queue {path} is corrupt: {reason}")]
    QueueCorrupt { path: PathBuf, reason: String },

    /// Local persistence failed (disk full, permissions, counter damage).
    #[error("Storage error: {0}")]
    Storage(String),

    /// A queued record lacks required fields and cannot be sent.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Entry input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::QueueCorrupt { path, reason } => SyncError::QueueCorrupt { path, reason },
            other => SyncError::Storage(other.to_string()),
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => SyncError::Validation(v),
            other => SyncError::MalformedRecord(other.to_string()),
        }
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        SyncError::Internal(format!("Blocking task failed: {}", err))
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Timeout error for a limit of `limit`.
    pub fn timeout(limit: std::time::Duration) -> Self {
        SyncError::Timeout(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX))
    }

    /// Returns true if the server could not take the request.
    ///
    /// These never reach the gate operator: the entry is queued offline, or
    /// the drain is retried later.
    pub fn is_network_class(&self) -> bool {
        matches!(
            self,
            SyncError::NetworkUnavailable(_)
                | SyncError::Timeout(_)
                | SyncError::ServerRejected { .. }
                | SyncError::InvalidResponse(_)
        )
    }

    /// Returns true if local state needs operator attention.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SyncError::QueueCorrupt { .. } | SyncError::Storage(_) | SyncError::MalformedRecord(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::NetworkUnavailable(_) => "network_unavailable",
            SyncError::Timeout(_) => "timeout",
            SyncError::ServerRejected { .. } => "server_rejected",
            SyncError::InvalidResponse(_) => "invalid_response",
            SyncError::QueueCorrupt { .. } => "queue_corrupt",
            SyncError::Storage(_) => "storage",
            SyncError::MalformedRecord(_) => "malformed_record",
            SyncError::Validation(_) => "validation",
            e if e.is_config_error() => "config",
            _ => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_class() {
        assert!(SyncError::NetworkUnavailable("refused".into()).is_network_class());
        assert!(SyncError::Timeout(5).is_network_class());
        assert!(SyncError::ServerRejected {
            status: 500,
            message: "boom".into()
        }
        .is_network_class());
        assert!(SyncError::InvalidResponse("not json".into()).is_network_class());

        assert!(!SyncError::Storage("disk full".into()).is_network_class());
        assert!(!SyncError::MissingDeviceId.is_network_class());
    }

    #[test]
    fn test_store_errors_keep_corruption_distinct() {
        let corrupt: SyncError = StoreError::queue_corrupt("/q.json", "EOF").into();
        assert!(matches!(corrupt, SyncError::QueueCorrupt { .. }));
        assert!(corrupt.is_structural());

        let io: SyncError = StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ))
        .into();
        assert!(matches!(io, SyncError::Storage(_)));
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidUrl("x".into()).is_config_error());
        assert!(!SyncError::Timeout(1).is_config_error());
        assert_eq!(SyncError::MissingDeviceId.kind(), "config");
    }

    #[test]
    fn test_sub_second_timeout_keeps_its_value() {
        let err = SyncError::timeout(std::time::Duration::from_millis(100));
        assert!(matches!(err, SyncError::Timeout(100)));
        assert_eq!(err.to_string(), "Request timeout after 100 ms");
    }

    #[test]
    fn test_malformed_record_is_structural() {
        let err: SyncError = CoreError::MalformedRecord {
            ticket: "OFF0001".into(),
            missing: vec!["plat"],
        }
        .into();
        assert!(matches!(err, SyncError::MalformedRecord(_)));
        assert!(err.is_structural());
        assert_eq!(err.kind(), "malformed_record");
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::ServerRejected {
            status: 422,
            message: "plat required".into(),
        };
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("plat required"));
    }
}

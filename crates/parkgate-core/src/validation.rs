//! # Validation Module
//!
//! Input validation for gate entries and queued records.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Entry input (THIS MODULE)                                    │
//! │  ├── normalize_plate: trim, uppercase, charset, length                 │
//! │  └── validate_device_id                                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Queued documents (THIS MODULE)                               │
//! │  └── missing_document_fields: raw JSON scan used by diagnostics        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Server                                                        │
//! │  └── de-duplicates by ticket_number                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use parkgate_core::validation::normalize_plate;
//!
//! assert_eq!(normalize_plate(" b 1234 xyz ").unwrap(), "B 1234 XYZ");
//! assert!(normalize_plate("").is_err());
//! ```

use crate::error::ValidationError;
use crate::{MAX_DEVICE_ID_LENGTH, MAX_PLATE_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Fields every queued document must carry.
pub const REQUIRED_RECORD_FIELDS: [&str; 4] = ["plat", "jenis", "ticket_number", "entry_time"];

// =============================================================================
// Entry Input
// =============================================================================

/// Validates and normalizes a license plate.
///
/// ## Rules
/// - Leading/trailing whitespace removed, inner runs collapsed to one space
/// - Uppercased
/// - Must not be empty
/// - At most [`MAX_PLATE_LENGTH`] characters
/// - Letters, digits, spaces and hyphens only
pub fn normalize_plate(plate: &str) -> ValidationResult<String> {
    let normalized = plate
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();

    if normalized.is_empty() {
        return Err(ValidationError::Required {
            field: "plate".to_string(),
        });
    }

    if normalized.chars().count() > MAX_PLATE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "plate".to_string(),
            max: MAX_PLATE_LENGTH,
        });
    }

    if !normalized
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "plate".to_string(),
            reason: "must contain only letters, numbers, spaces, and hyphens".to_string(),
        });
    }

    Ok(normalized)
}

/// Validates a gate device id.
pub fn validate_device_id(device_id: &str) -> ValidationResult<()> {
    let device_id = device_id.trim();

    if device_id.is_empty() {
        return Err(ValidationError::Required {
            field: "device_id".to_string(),
        });
    }

    if device_id.len() > MAX_DEVICE_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: "device_id".to_string(),
            max: MAX_DEVICE_ID_LENGTH,
        });
    }

    Ok(())
}

// =============================================================================
// Queued Documents
// =============================================================================

/// Required fields absent (or blank) in a raw queued document.
///
/// Works on untyped JSON so that a single damaged entry can be reported
/// without failing the whole file.
pub fn missing_document_fields(document: &serde_json::Value) -> Vec<&'static str> {
    REQUIRED_RECORD_FIELDS
        .iter()
        .copied()
        .filter(|field| match document.get(*field) {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

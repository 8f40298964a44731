//! # parkgate-core: Pure Domain Logic for the ParkGate Edge Client
//!
//! This crate holds the types every other layer agrees on: what a vehicle
//! entry looks like, what a printed ticket carries, and how offline ticket
//! numbers are spelled. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ParkGate Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              gate-client (entry signals → tickets)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   parkgate-sync: EntryProcessor, SyncManager, SyncAgent          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   parkgate-store: OfflineQueue, TicketIdAllocator                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ parkgate-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │  ticket   │  │ validation│                  │   │
//! │  │   │EntryRecord│  │ OFF0001   │  │   plate   │                  │   │
//! │  │   │TicketData │  │  format   │  │  records  │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO FILES • NO NETWORK • PURE FUNCTIONS               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (EntryRecord, TicketData, VehicleType, ...)
//! - [`ticket`] - Offline ticket number format
//! - [`time`] - Timestamp parsing for queue files and server replies
//! - [`error`] - Domain error types
//! - [`validation`] - Input and record validation
//!
//! ## Example Usage
//!
//! ```rust
//! use parkgate_core::ticket::{format_offline_ticket, parse_offline_sequence};
//!
//! let ticket = format_offline_ticket(7);
//! assert_eq!(ticket, "OFF0007");
//! assert_eq!(parse_offline_sequence(&ticket), Some(7));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ticket;
pub mod time;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum plate length accepted from OCR or manual entry.
pub const MAX_PLATE_LENGTH: usize = 20;

/// Maximum device id length.
pub const MAX_DEVICE_ID_LENGTH: usize = 64;

//! # Domain Types
//!
//! Core domain types used throughout the gate client.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  EntryRequest   │   │  EntryRecord    │   │   TicketData    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  plat           │──►│  plat, jenis    │──►│  ticket_number  │       │
//! │  │  jenis          │   │  device_id      │   │  plate          │       │
//! │  │  device_id      │   │  entry_time     │   │  vehicle_type   │       │
//! │  │  entry_image?   │   │  ticket_number  │   │  entry_time     │       │
//! │  └─────────────────┘   │  is_offline     │   │  is_offline     │       │
//! │     (sent online)      └─────────────────┘   └─────────────────┘       │
//! │                          (queued offline)     (to printer / gate)      │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  VehicleType    │   │   EntryImage    │   │  SyncOutcome    │       │
//! │  │  Motor/Mobil/   │   │  raw bytes,     │   │  synced_count   │       │
//! │  │  Truk           │   │  base64 in JSON │   │  remaining_count│       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Names
//! Field names follow the central server's entry API (`plat`, `jenis`,
//! `device_id`, `entry_image`), so the same serialization is used for the
//! HTTP payload and for the offline queue file.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Vehicle Type
// =============================================================================

/// Vehicle category as known to the parking server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    /// Motorcycle.
    Motor,
    /// Passenger car.
    Mobil,
    /// Truck.
    Truk,
}

impl VehicleType {
    /// All recognized categories.
    pub const ALL: [VehicleType; 3] = [VehicleType::Motor, VehicleType::Mobil, VehicleType::Truk];

    /// Returns the server's name for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Motor => "Motor",
            VehicleType::Mobil => "Mobil",
            VehicleType::Truk => "Truk",
        }
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VehicleType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "motor" | "motorcycle" | "motorbike" => Ok(VehicleType::Motor),
            "mobil" | "car" => Ok(VehicleType::Mobil),
            "truk" | "truck" => Ok(VehicleType::Truk),
            _ => Err(ValidationError::NotAllowed {
                field: "vehicle_type".to_string(),
                allowed: VehicleType::ALL.iter().map(|v| v.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Entry Image
// =============================================================================

/// Plate snapshot attached to an entry.
///
/// Held as raw bytes; serialized as a standard base64 string.
#[derive(Clone, PartialEq, Eq)]
pub struct EntryImage(Vec<u8>);

impl EntryImage {
    /// Wraps raw image bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        EntryImage(bytes.into())
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the base64 encoding used on the wire.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Number of raw bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the image carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Images can be large; never dump them into logs.
impl std::fmt::Debug for EntryImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EntryImage({} bytes)", self.0.len())
    }
}

impl Serialize for EntryImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for EntryImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(EntryImage)
            .map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Entry Request
// =============================================================================

/// An entry as submitted to the server while online.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRequest {
    /// Normalized license plate.
    #[serde(rename = "plat")]
    pub plate: String,

    /// Vehicle category.
    #[serde(rename = "jenis")]
    pub vehicle_type: VehicleType,

    /// Originating gate.
    pub device_id: String,

    /// Optional snapshot, carried in the same payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_image: Option<EntryImage>,
}

// =============================================================================
// Entry Record
// =============================================================================

/// One vehicle-entry observation as stored in the offline queue.
///
/// ## Ticket Number Invariant
/// `ticket_number` is assigned once. Offline records keep their locally
/// generated number for their whole life, including after sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Vehicle identifier as read or entered.
    #[serde(rename = "plat")]
    pub plate: String,

    /// Vehicle category.
    #[serde(rename = "jenis")]
    pub vehicle_type: VehicleType,

    /// Originating gate.
    #[serde(default)]
    pub device_id: String,

    /// When the vehicle was observed. Naive timestamps from older clients
    /// are read as local time.
    #[serde(deserialize_with = "crate::time::deserialize_timestamp")]
    pub entry_time: DateTime<Utc>,

    /// Ticket printed for this entry.
    pub ticket_number: String,

    /// True until the server has accepted the record.
    #[serde(default = "default_offline")]
    pub is_offline: bool,

    /// Optional snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_image: Option<EntryImage>,
}

fn default_offline() -> bool {
    true
}

impl EntryRecord {
    /// Builds the offline record for a request the server did not accept.
    pub fn offline(
        request: EntryRequest,
        ticket_number: impl Into<String>,
        entry_time: DateTime<Utc>,
    ) -> Self {
        EntryRecord {
            plate: request.plate,
            vehicle_type: request.vehicle_type,
            device_id: request.device_id,
            entry_time,
            ticket_number: ticket_number.into(),
            is_offline: true,
            entry_image: request.entry_image,
        }
    }

    /// Returns the ticket data handed to printers and gate actuators.
    pub fn ticket_data(&self) -> TicketData {
        TicketData {
            ticket_number: self.ticket_number.clone(),
            plate: self.plate.clone(),
            vehicle_type: self.vehicle_type,
            entry_time: self.entry_time,
            is_offline: self.is_offline,
        }
    }

    /// Names of required fields that are empty.
    ///
    /// `jenis` and `entry_time` are enforced by the type itself.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.plate.trim().is_empty() {
            missing.push("plat");
        }
        if self.ticket_number.trim().is_empty() {
            missing.push("ticket_number");
        }
        missing
    }

    /// Fails with [`CoreError::MalformedRecord`] when a required field is
    /// empty.
    pub fn check(&self) -> CoreResult<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            return Ok(());
        }
        Err(CoreError::MalformedRecord {
            ticket: self.ticket_number.clone(),
            missing,
        })
    }
}

// =============================================================================
// Ticket Data
// =============================================================================

/// What downstream printing and gate actuation consume.
///
/// Produced exactly once per entry and never re-fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketData {
    /// Server-issued or offline ticket number (never empty).
    pub ticket_number: String,

    /// Plate printed on the ticket.
    pub plate: String,

    /// Vehicle category.
    pub vehicle_type: VehicleType,

    /// Entry timestamp printed on the ticket.
    pub entry_time: DateTime<Utc>,

    /// Whether the ticket was issued without server confirmation.
    pub is_offline: bool,
}

impl TicketData {
    /// Ticket data for an entry the server accepted.
    pub fn online(
        ticket_number: impl Into<String>,
        request: &EntryRequest,
        entry_time: DateTime<Utc>,
    ) -> Self {
        TicketData {
            ticket_number: ticket_number.into(),
            plate: request.plate.clone(),
            vehicle_type: request.vehicle_type,
            entry_time,
            is_offline: false,
        }
    }
}

// =============================================================================
// Sync Outcome
// =============================================================================

/// Result of one drain of the offline queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Records the server accepted and that were removed from the queue.
    pub synced_count: usize,

    /// Records still waiting in the queue.
    pub remaining_count: usize,
}

impl SyncOutcome {
    /// Outcome of a drain that found nothing to do.
    pub const fn empty() -> Self {
        SyncOutcome {
            synced_count: 0,
            remaining_count: 0,
        }
    }

    /// True when nothing is left in the queue.
    pub fn is_fully_synced(&self) -> bool {
        self.remaining_count == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

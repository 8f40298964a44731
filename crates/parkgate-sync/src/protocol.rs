//! # Server Protocol
//!
//! JSON payloads exchanged with the central parking server.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Central Server API                               │
//! │                                                                         │
//! │  POST {base}/entry/                                                    │
//! │  ───────────────────                                                   │
//! │  → { "plat": "B1234XYZ", "jenis": "Motor", "device_id": "GATE_01",     │
//! │      "entry_image": "<base64>" }                                       │
//! │  ← 201 { "status": "success",                                          │
//! │          "data": { "ticket_number": "TKT-000123",                      │
//! │                    "plat": "B1234XYZ",                                 │
//! │                    "entry_time": "2024-03-01T08:30:00Z" } }            │
//! │                                                                         │
//! │  POST {base}/entry/sync_offline_entries/                               │
//! │  ────────────────────────────────────────                              │
//! │  → { "entries": [ EntryRecord, ... ],                                  │
//! │      "device_id": "GATE_01", "batch_id": "<uuid>" }                    │
//! │  ← 200 { "status": "success", "accepted": 3 }                          │
//! │                                                                         │
//! │  GET {base}/test                                                       │
//! │  ───────────────                                                       │
//! │  ← 200 (any body)                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Servers in the field differ slightly: some answer `tiket`/`waktu`, some
//! put the ticket at the top level, some send naive timestamps. Parsing
//! here accepts all of those.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use parkgate_core::EntryRecord;

/// Path of the single-entry endpoint, relative to the API root.
pub const ENTRY_PATH: &str = "entry/";

/// Path of the batch endpoint, relative to the API root.
pub const BATCH_PATH: &str = "entry/sync_offline_entries/";

/// Path of the health endpoint, relative to the API root.
pub const HEALTH_PATH: &str = "test";

// =============================================================================
// Entry Response
// =============================================================================

/// The server's canonical ticket for an accepted entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTicket {
    /// Server-issued ticket number.
    pub ticket_number: String,

    /// Plate as recorded by the server.
    pub plate: Option<String>,

    /// Server-side entry time.
    pub entry_time: Option<DateTime<Utc>>,
}

impl ServerTicket {
    /// Extracts the ticket from an entry response body.
    pub fn from_response(body: &Value) -> Result<Self, String> {
        check_status(body)?;

        let data = body.get("data").filter(|d| d.is_object()).unwrap_or(body);

        let ticket_number = field(data, &["ticket_number", "tiket"])
            .and_then(scalar_to_string)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| "response carries no ticket number".to_string())?;

        let plate = field(data, &["plat", "plate"])
            .and_then(Value::as_str)
            .map(str::to_string);

        let entry_time = field(data, &["entry_time", "waktu"])
            .and_then(Value::as_str)
            .and_then(parse_server_time);

        Ok(ServerTicket {
            ticket_number,
            plate,
            entry_time,
        })
    }
}

// =============================================================================
// Batch Payload / Receipt
// =============================================================================

/// Body of a batch upload.
#[derive(Debug, Serialize)]
pub struct BatchPayload<'a> {
    /// Records in queue order.
    pub entries: &'a [EntryRecord],

    /// Uploading gate.
    pub device_id: &'a str,

    /// Fresh per attempt, for server-side request tracing.
    pub batch_id: Uuid,
}

impl<'a> BatchPayload<'a> {
    /// Creates a payload with a new batch id.
    pub fn new(entries: &'a [EntryRecord], device_id: &'a str) -> Self {
        BatchPayload {
            entries,
            device_id,
            batch_id: Uuid::new_v4(),
        }
    }
}

/// What the server acknowledged for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReceipt {
    /// Entries accepted or recognized as duplicates.
    pub accepted: usize,
}

impl BatchReceipt {
    /// Reads the receipt from a batch response body.
    ///
    /// Servers that do not report a count accepted the whole batch. A body
    /// whose `status` reports failure accepted nothing, whatever the HTTP
    /// status said.
    pub fn from_response(body: Option<&Value>, batch_len: usize) -> Result<Self, String> {
        if let Some(body) = body {
            check_status(body)?;
        }

        let reported = body.and_then(|b| {
            let data = b.get("data").filter(|d| d.is_object()).unwrap_or(b);
            field(data, &["accepted", "synced_count"]).and_then(Value::as_u64)
        });

        Ok(BatchReceipt {
            accepted: reported.map(|n| n as usize).unwrap_or(batch_len),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Rejects bodies whose `status` reports a failure.
fn check_status(body: &Value) -> Result<(), String> {
    let Some(status) = body.get("status").and_then(Value::as_str) else {
        return Ok(());
    };
    if matches!(status.to_lowercase().as_str(), "error" | "failed" | "fail") {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(format!("server reported {}: {}", status, message));
    }
    Ok(())
}

fn field<'v>(value: &'v Value, names: &[&str]) -> Option<&'v Value> {
    names
        .iter()
        .find_map(|name| value.get(*name).filter(|v| !v.is_null()))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses a server timestamp. Naive values are the server's wall clock,
/// which shares the gate's time zone.
pub fn parse_server_time(raw: &str) -> Option<DateTime<Utc>> {
    parkgate_core::time::parse_timestamp(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_entry_response_nested() {
        let body = json!({
            "status": "success",
            "data": {
                "ticket_number": "TKT-000123",
                "plat": "B1234XYZ",
                "entry_time": "2024-03-01T08:30:00Z"
            }
        });

        let ticket = ServerTicket::from_response(&body).unwrap();
        assert_eq!(ticket.ticket_number, "TKT-000123");
        assert_eq!(ticket.plate.as_deref(), Some("B1234XYZ"));
        assert_eq!(
            ticket.entry_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_entry_response_aliases() {
        let body = json!({ "tiket": 42, "waktu": "2024-03-01 08:30:00" });

        let ticket = ServerTicket::from_response(&body).unwrap();
        assert_eq!(ticket.ticket_number, "42");
        assert!(ticket.plate.is_none());

        let local = chrono::Local
            .with_ymd_and_hms(2024, 3, 1, 8, 30, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(ticket.entry_time, Some(local));
    }

    #[test]
    fn test_entry_response_without_ticket() {
        assert!(ServerTicket::from_response(&json!({"status": "success", "data": {}})).is_err());
        assert!(ServerTicket::from_response(&json!({"ticket_number": ""})).is_err());
    }

    #[test]
    fn test_entry_response_error_status() {
        let body = json!({"status": "error", "message": "plat required"});
        let err = ServerTicket::from_response(&body).unwrap_err();
        assert!(err.contains("plat required"));
    }

    #[test]
    fn test_unparsable_time_is_dropped() {
        let body = json!({"ticket_number": "T1", "entry_time": "yesterday"});
        assert!(ServerTicket::from_response(&body).unwrap().entry_time.is_none());
    }

    #[test]
    fn test_batch_receipt() {
        let accepted = |body: Option<Value>| {
            BatchReceipt::from_response(body.as_ref(), 3)
                .unwrap()
                .accepted
        };

        assert_eq!(accepted(None), 3);
        assert_eq!(accepted(Some(json!({"status": "success"}))), 3);
        assert_eq!(accepted(Some(json!({"accepted": 2}))), 2);
        assert_eq!(accepted(Some(json!({"data": {"synced_count": 1}}))), 1);
    }

    #[test]
    fn test_batch_receipt_error_status() {
        for status in ["error", "Failed", "fail"] {
            let body = json!({"status": status, "message": "db down"});
            let err = BatchReceipt::from_response(Some(&body), 3).unwrap_err();
            assert!(err.contains("db down"));
        }
    }

    #[test]
    fn test_batch_payload_shape() {
        let payload = BatchPayload::new(&[], "GATE_01");
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["entries"], json!([]));
        assert_eq!(json["device_id"], "GATE_01");
        assert!(json["batch_id"].as_str().is_some());
    }
}

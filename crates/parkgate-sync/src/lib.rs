//! # parkgate-sync: Entry Processing and Sync Engine for ParkGate
//!
//! This crate decides, for every vehicle arriving at a gate, whether the
//! entry can be committed to the central server right away or must be
//! queued locally, and drains the offline queue back to the server.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Gate Sync Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      GateClient (composition root)               │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ EntryProcessor │  │  SyncManager   │  │  SyncAgent             │    │
//! │  │                │  │                │  │                        │    │
//! │  │ POST entry/    │  │ One batch per  │  │ Interval + triggers    │    │
//! │  │ or OFFnnnn     │  │ drain, removes │  │ Exponential backoff    │    │
//! │  │ from the queue │  │ what was sent  │  │ SyncStatus             │    │
//! │  └───────┬────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │          │                   │                                          │
//! │          ▼                   ▼                                          │
//! │  ┌────────────────────────────────────┐  ┌────────────────────────┐    │
//! │  │ ServerGateway (HttpGateway)        │  │ SharedQueue            │    │
//! │  │ entry/, entry/sync_offline_entries/│  │ offline_data.json      │    │
//! │  │ test                               │  │ + ticket counter       │    │
//! │  └────────────────────────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  STATUS EVENTS (GateEventEmitter):                                     │
//! │  • status   - SyncStatus after every drain                             │
//! │  • progress - pending/synced counts                                    │
//! │  • error    - drain failures and queue quarantine                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`agent`] - Background `SyncAgent` and its status
//! - [`client`] - `GateClient` wiring everything for one gate
//! - [`config`] - Gate configuration (TOML file + environment)
//! - [`diagnostics`] - Operator checks and repairs
//! - [`error`] - Sync error types
//! - [`gateway`] - Central server API over HTTP
//! - [`manager`] - Offline queue drain
//! - [`processor`] - Online-first entry processing
//! - [`protocol`] - Wire payloads and response parsing
//! - [`queue`] - Async handle over the offline queue and ticket counter
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parkgate_core::VehicleType;
//! use parkgate_sync::{GateClient, GateConfig};
//!
//! let config = GateConfig::load_or_default(None);
//! let mut client = GateClient::new(config)?;
//! client.start_agent()?;
//!
//! let ticket = client.process_entry("B 1234 XYZ", VehicleType::Mobil, None).await?;
//! println!("{} (offline: {})", ticket.ticket_number, ticket.is_offline);
//!
//! client.shutdown().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod gateway;
pub mod manager;
pub mod processor;
pub mod protocol;
pub mod queue;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{
    AgentSettings, DrainTrigger, GateEventEmitter, NoOpEmitter, SyncAgent, SyncAgentHandle,
    SyncStatus,
};
pub use client::{GateClient, GateClientBuilder};
pub use config::GateConfig;
pub use diagnostics::{Diagnostics, DiagnosticsReport, Issue, ServerCheck};
pub use error::{SyncError, SyncResult};
pub use gateway::{HttpGateway, ServerGateway};
pub use manager::{DrainReport, SyncManager};
pub use processor::EntryProcessor;
pub use protocol::{BatchReceipt, ServerTicket};
pub use queue::SharedQueue;

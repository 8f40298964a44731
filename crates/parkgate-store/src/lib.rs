//! # parkgate-store: Offline Queue Persistence for ParkGate
//!
//! This crate provides the durable local state of a gate client: the queue
//! of entries the server has not confirmed yet, and the counter behind
//! offline ticket numbers.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ParkGate Data Flow                               │
//! │                                                                         │
//! │  EntryProcessor (server unreachable)        SyncManager (drain)         │
//! │       │                                          │                      │
//! │       ▼                                          ▼                      │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  parkgate-store (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ OfflineQueue  │    │TicketIdAlloc. │    │   atomic     │  │   │
//! │  │   │  (queue.rs)   │    │(allocator.rs) │    │ (atomic.rs)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ append        │    │ OFF0001,      │    │ temp file    │  │   │
//! │  │   │ load_all      │    │ OFF0002, ...  │───►│ fsync        │  │   │
//! │  │   │ remove_synced │───────────────────────►│ rename       │  │   │
//! │  │   │ inspect       │    │ persisted     │    │ dir fsync    │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   <data dir>/offline_data.json     <data dir>/offline_counter.json │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Types here are synchronous and not internally locked. The sync crate
//! owns the single lock that serializes every queue operation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parkgate_store::{OfflineQueue, TicketIdAllocator};
//!
//! let queue = OfflineQueue::open("/var/lib/parkgate/offline_data.json");
//! let mut allocator = TicketIdAllocator::open(queue.counter_path(), &queue)?;
//!
//! let ticket = allocator.next_offline_id(queue.len()?)?;
//! queue.append(EntryRecord::offline(request, ticket, Utc::now()))?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocator;
pub mod atomic;
pub mod error;
pub mod queue;

// =============================================================================
// Re-exports
// =============================================================================

pub use allocator::TicketIdAllocator;
pub use error::{StoreError, StoreResult};
pub use queue::{AppendOutcome, DocumentIssue, OfflineQueue, QueueInspection};

/// Default queue file name.
pub const QUEUE_FILE_NAME: &str = "offline_data.json";

/// Default counter file name.
pub const COUNTER_FILE_NAME: &str = "offline_counter.json";

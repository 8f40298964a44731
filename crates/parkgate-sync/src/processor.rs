//! # Entry Processor
//!
//! Turns one vehicle arrival into ticket data, online or offline.
//!
//! ## Decision Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  process_entry(plate, type, image)                      │
//! │                                                                         │
//! │   normalize plate ──invalid──► Err(Validation)                          │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   submit_entry (bounded by timeout)                                    │
//! │        │                                                                │
//! │   ┌────┴─────────────┐                                                  │
//! │   │ accepted         │ failed (any kind)                               │
//! │   ▼                  ▼                                                  │
//! │  server ticket    [queue lock] next OFF number + append                │
//! │  is_offline=false  is_offline=true                                     │
//! │   │                  │                                                  │
//! │   └────────┬─────────┘                                                  │
//! │            ▼                                                            │
//! │   DrainTrigger::request()   (never waits for the drain)                │
//! │            ▼                                                            │
//! │   TicketData → printer / gate                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use parkgate_core::validation::normalize_plate;
use parkgate_core::{EntryImage, EntryRequest, TicketData, VehicleType};

use crate::agent::{DrainTrigger, GateEventEmitter};
use crate::error::{SyncError, SyncResult};
use crate::gateway::ServerGateway;
use crate::queue::SharedQueue;

/// Decides per entry between server commit and offline queue.
#[derive(Clone)]
pub struct EntryProcessor {
    gateway: Arc<dyn ServerGateway>,
    queue: SharedQueue,
    trigger: DrainTrigger,
    emitter: Arc<dyn GateEventEmitter>,
    device_id: String,
    submit_timeout: Duration,
}

impl EntryProcessor {
    /// Creates a processor.
    ///
    /// `submit_timeout` bounds the whole online attempt, whatever the
    /// gateway does internally.
    pub fn new(
        gateway: Arc<dyn ServerGateway>,
        queue: SharedQueue,
        trigger: DrainTrigger,
        emitter: Arc<dyn GateEventEmitter>,
        device_id: impl Into<String>,
        submit_timeout: Duration,
    ) -> Self {
        EntryProcessor {
            gateway,
            queue,
            trigger,
            emitter,
            device_id: device_id.into(),
            submit_timeout,
        }
    }

    /// Processes one vehicle arrival.
    ///
    /// Only invalid input and local storage failures are errors. Every
    /// other outcome yields a ticket.
    pub async fn process_entry(
        &self,
        plate: &str,
        vehicle_type: VehicleType,
        image: Option<EntryImage>,
    ) -> SyncResult<TicketData> {
        let plate = normalize_plate(plate)?;
        let request = EntryRequest {
            plate,
            vehicle_type,
            device_id: self.device_id.clone(),
            entry_image: image,
        };

        let result = match tokio::time::timeout(
            self.submit_timeout,
            self.gateway.submit_entry(&request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::timeout(self.submit_timeout)),
        };

        let ticket = match result {
            Ok(server) => {
                let entry_time = server.entry_time.unwrap_or_else(Utc::now);
                let ticket = TicketData::online(server.ticket_number, &request, entry_time);
                info!(
                    ticket_number = %ticket.ticket_number,
                    plate = %ticket.plate,
                    "Entry accepted by server"
                );
                ticket
            }
            Err(e) => {
                Self::log_submit_failure(&e, &request.plate);
                self.queue_offline(request).await?
            }
        };

        self.trigger.request();
        Ok(ticket)
    }

    async fn queue_offline(&self, request: EntryRequest) -> SyncResult<TicketData> {
        let (record, outcome) = self.queue.enqueue(request, Utc::now()).await?;

        if let Some(ref moved) = outcome.quarantined {
            let message = format!(
                "Offline queue was corrupt and has been moved to {}",
                moved.display()
            );
            error!(quarantined = %moved.display(), "Offline queue quarantined");
            self.emitter.emit_error(&message, false);
        }

        info!(
            ticket_number = %record.ticket_number,
            plate = %record.plate,
            queued = outcome.queued,
            "Entry queued offline"
        );
        Ok(record.ticket_data())
    }

    fn log_submit_failure(e: &SyncError, plate: &str) {
        match e {
            SyncError::ServerRejected { status, message } => warn!(
                status,
                %message,
                %plate,
                "Server rejected entry, issuing offline ticket"
            ),
            e if e.is_network_class() => info!(
                kind = e.kind(),
                error = %e,
                %plate,
                "Server unavailable, issuing offline ticket"
            ),
            e => error!(
                kind = e.kind(),
                error = ?e,
                %plate,
                "Entry submission failed, issuing offline ticket"
            ),
        }
    }
}

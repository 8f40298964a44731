//! # Sync Manager
//!
//! Drains the offline queue to the server in one batch.
//!
//! ## Drain Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          drain()                                        │
//! │                                                                         │
//! │  1. Gate:    one drain at a time (drain waits, try_drain skips)        │
//! │                                                                         │
//! │  2. Read:    [queue lock] load_all ──► empty? → {0, 0}, no request     │
//! │                                                                         │
//! │  3. Send:    submit_batch(records)            (no lock held)           │
//! │              malformed record → MalformedRecord, nothing sent          │
//! │              no answer within batch_timeout → Timeout                  │
//! │                                                                         │
//! │  4a. 2xx:    [queue lock] remove_synced(batch tickets)                 │
//! │              → {batch_len, records appended meanwhile}                 │
//! │                                                                         │
//! │  4b. fail:   queue untouched → {0, batch_len}; retried later           │
//! │                                                                         │
//! │  Delivery is at-least-once. A timeout after the server committed      │
//! │  resends the same ticket numbers; the server ignores duplicates.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use parkgate_core::SyncOutcome;

use crate::error::{SyncError, SyncResult};
use crate::gateway::ServerGateway;
use crate::queue::SharedQueue;

// =============================================================================
// Drain Report
// =============================================================================

/// Outcome of a drain plus the network failure that cut it short, if any.
#[derive(Debug)]
pub struct DrainReport {
    /// Counts as seen by callers of [`SyncManager::drain`].
    pub outcome: SyncOutcome,

    /// Whether the server was contacted at all.
    pub contacted_server: bool,

    /// Why the batch was not delivered.
    pub network_error: Option<SyncError>,
}

impl DrainReport {
    fn idle() -> Self {
        DrainReport {
            outcome: SyncOutcome::empty(),
            contacted_server: false,
            network_error: None,
        }
    }

    /// True when the batch (if any) was delivered.
    pub fn is_success(&self) -> bool {
        self.network_error.is_none()
    }
}

// =============================================================================
// Sync Manager
// =============================================================================

/// Upper bound on one batch upload unless configured otherwise.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Submits queued records and removes the ones the server took.
#[derive(Clone)]
pub struct SyncManager {
    gateway: Arc<dyn ServerGateway>,
    queue: SharedQueue,
    drain_gate: Arc<Mutex<()>>,
    batch_timeout: Duration,
}

impl SyncManager {
    /// Creates a manager over `queue`.
    pub fn new(gateway: Arc<dyn ServerGateway>, queue: SharedQueue) -> Self {
        SyncManager {
            gateway,
            queue,
            drain_gate: Arc::new(Mutex::new(())),
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }

    /// Bounds each batch upload, so a server that never answers cannot hold
    /// the drain gate.
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Drains the queue, waiting for an in-flight drain first.
    ///
    /// Network failures are not errors: they leave the queue as it was and
    /// report everything as remaining. A corrupt queue is an error.
    pub async fn drain(&self) -> SyncResult<SyncOutcome> {
        self.drain_report().await.map(|r| r.outcome)
    }

    /// Drains unless another drain is in flight, in which case `None`.
    pub async fn try_drain(&self) -> Option<SyncResult<SyncOutcome>> {
        self.try_drain_report()
            .await
            .map(|r| r.map(|report| report.outcome))
    }

    /// Like [`drain`](Self::drain) but also reports the network failure.
    pub async fn drain_report(&self) -> SyncResult<DrainReport> {
        let _gate = self.drain_gate.lock().await;
        self.drain_locked().await
    }

    /// Like [`try_drain`](Self::try_drain) but also reports the network failure.
    pub async fn try_drain_report(&self) -> Option<SyncResult<DrainReport>> {
        let _gate = self.drain_gate.try_lock().ok()?;
        Some(self.drain_locked().await)
    }

    /// Records waiting in the queue.
    pub async fn pending(&self) -> SyncResult<usize> {
        self.queue.len().await
    }

    async fn drain_locked(&self) -> SyncResult<DrainReport> {
        let records = self.queue.load_all().await?;
        if records.is_empty() {
            debug!("Offline queue empty, nothing to drain");
            return Ok(DrainReport::idle());
        }

        for record in &records {
            record.check()?;
        }

        let batch_len = records.len();
        info!(count = batch_len, "Draining offline queue");

        let result = match tokio::time::timeout(
            self.batch_timeout,
            self.gateway.submit_batch(&records),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::timeout(self.batch_timeout)),
        };

        match result {
            Ok(receipt) => {
                if receipt.accepted < batch_len {
                    warn!(
                        accepted = receipt.accepted,
                        count = batch_len,
                        "Server accepted fewer entries than submitted"
                    );
                }

                let tickets: Vec<String> = records.into_iter().map(|r| r.ticket_number).collect();
                let remaining = self.queue.remove_synced(tickets).await?;

                info!(synced = batch_len, remaining, "Offline queue drained");
                Ok(DrainReport {
                    outcome: SyncOutcome {
                        synced_count: batch_len,
                        remaining_count: remaining,
                    },
                    contacted_server: true,
                    network_error: None,
                })
            }
            Err(e) if e.is_network_class() => {
                warn!(
                    kind = e.kind(),
                    error = %e,
                    count = batch_len,
                    "Drain failed, queue kept for retry"
                );
                Ok(DrainReport {
                    outcome: SyncOutcome {
                        synced_count: 0,
                        remaining_count: batch_len,
                    },
                    contacted_server: true,
                    network_error: Some(e),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parkgate_core::{EntryRequest, VehicleType};
    use std::fs;

    use crate::testing::{GatewayMode, ScriptedGateway};

    fn request(plate: &str) -> EntryRequest {
        EntryRequest {
            plate: plate.to_string(),
            vehicle_type: VehicleType::Motor,
            device_id: "GATE_01".to_string(),
            entry_image: None,
        }
    }

    async fn setup(
        dir: &tempfile::TempDir,
        queued: usize,
    ) -> (Arc<ScriptedGateway>, SharedQueue, SyncManager) {
        let gateway = Arc::new(ScriptedGateway::new());
        let queue = SharedQueue::open(dir.path().join("offline_data.json")).unwrap();
        for i in 0..queued {
            queue
                .enqueue(request(&format!("B{}", i)), Utc::now())
                .await
                .unwrap();
        }
        let manager = SyncManager::new(gateway.clone(), queue.clone());
        (gateway, queue, manager)
    }

    #[tokio::test]
    async fn test_successful_drain_empties_queue() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, queue, manager) = setup(&dir, 3).await;

        let outcome = manager.drain().await.unwrap();

        assert_eq!(outcome.synced_count, 3);
        assert_eq!(outcome.remaining_count, 0);
        assert_eq!(queue.len().await.unwrap(), 0);
        assert!(!queue.path().exists());
        assert_eq!(gateway.batches().len(), 1);
        assert_eq!(gateway.batches()[0].len(), 3);
    }

    #[tokio::test]
    async fn test_failed_drain_leaves_queue_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, queue, manager) = setup(&dir, 3).await;
        let before = fs::read(queue.path()).unwrap();

        gateway.set_mode(GatewayMode::Offline);
        let outcome = manager.drain().await.unwrap();

        assert_eq!(outcome.synced_count, 0);
        assert_eq!(outcome.remaining_count, 3);
        assert_eq!(fs::read(queue.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_rejected_drain_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, _queue, manager) = setup(&dir, 2).await;

        gateway.set_mode(GatewayMode::Rejecting(503));
        let report = manager.drain_report().await.unwrap();

        assert!(!report.is_success());
        assert!(report.contacted_server);
        assert_eq!(report.outcome.remaining_count, 2);
    }

    #[tokio::test]
    async fn test_second_drain_submits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, _queue, manager) = setup(&dir, 2).await;

        let first = manager.drain().await.unwrap();
        let second = manager.drain().await.unwrap();

        assert_eq!(first.synced_count, 2);
        assert_eq!(second, SyncOutcome::empty());
        assert_eq!(gateway.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_queue_does_not_contact_server() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, _queue, manager) = setup(&dir, 0).await;

        let report = manager.drain_report().await.unwrap();
        assert!(!report.contacted_server);
        assert!(gateway.batches().is_empty());
    }

    #[tokio::test]
    async fn test_resend_after_lost_ack_is_deduplicated_by_server() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, queue, manager) = setup(&dir, 2).await;

        // Server commits the batch but the response never arrives.
        gateway.set_mode(GatewayMode::CommitThenTimeout);
        let first = manager.drain().await.unwrap();
        assert_eq!(first.remaining_count, 2);
        assert_eq!(queue.len().await.unwrap(), 2);

        gateway.set_mode(GatewayMode::Online);
        let second = manager.drain().await.unwrap();
        assert_eq!(second.synced_count, 2);

        assert_eq!(gateway.batches().len(), 2);
        assert_eq!(gateway.committed_tickets(), vec!["OFF0001", "OFF0002"]);
    }

    #[tokio::test]
    async fn test_append_during_drain_survives() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, queue, manager) = setup(&dir, 2).await;
        gateway.hold_batches();

        let drain = tokio::spawn({
            let manager = manager.clone();
            async move { manager.drain().await }
        });

        gateway.batch_started().await;
        let (late, _) = queue.enqueue(request("LATE1"), Utc::now()).await.unwrap();
        gateway.release_batch();

        let outcome = drain.await.unwrap().unwrap();
        assert_eq!(outcome.synced_count, 2);
        assert_eq!(outcome.remaining_count, 1);

        let left = queue.load_all().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].ticket_number, late.ticket_number);
    }

    #[tokio::test]
    async fn test_try_drain_skips_while_busy() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, _queue, manager) = setup(&dir, 1).await;
        gateway.hold_batches();

        let drain = tokio::spawn({
            let manager = manager.clone();
            async move { manager.drain().await }
        });
        gateway.batch_started().await;

        assert!(manager.try_drain().await.is_none());

        gateway.release_batch();
        drain.await.unwrap().unwrap();
        assert_eq!(gateway.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_hanging_server_times_out_and_releases_gate() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, queue, manager) = setup(&dir, 1).await;
        let manager = manager.with_batch_timeout(Duration::from_millis(100));
        let before = fs::read(queue.path()).unwrap();

        gateway.set_mode(GatewayMode::Hang);
        let report = manager.drain_report().await.unwrap();

        assert!(matches!(report.network_error, Some(SyncError::Timeout(100))));
        assert_eq!(report.outcome.synced_count, 0);
        assert_eq!(report.outcome.remaining_count, 1);
        assert_eq!(fs::read(queue.path()).unwrap(), before);

        // The gate is free again for the next attempt.
        gateway.set_mode(GatewayMode::Online);
        let outcome = manager.try_drain().await.unwrap().unwrap();
        assert_eq!(outcome.synced_count, 1);
    }

    #[tokio::test]
    async fn test_queue_from_older_client_drains() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, queue, manager) = setup(&dir, 0).await;
        fs::write(
            queue.path(),
            r#"[{"plat": "B1234XYZ", "jenis": "Motor", "entry_time": "2024-03-01T08:30:00.123456", "ticket_number": "OFF20240301083000", "is_offline": true}]"#,
        )
        .unwrap();

        let outcome = manager.drain().await.unwrap();

        assert_eq!(outcome.synced_count, 1);
        assert_eq!(outcome.remaining_count, 0);
        assert_eq!(queue.len().await.unwrap(), 0);
        assert_eq!(gateway.committed_tickets(), vec!["OFF20240301083000"]);
    }

    #[tokio::test]
    async fn test_malformed_record_blocks_drain() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, queue, manager) = setup(&dir, 0).await;
        fs::write(
            queue.path(),
            r#"[{"plat": "", "jenis": "Mobil", "device_id": "GATE_01", "entry_time": "2024-03-01T08:30:00Z", "ticket_number": "OFF0001", "is_offline": true}]"#,
        )
        .unwrap();

        let err = manager.drain().await.unwrap_err();

        assert!(matches!(err, SyncError::MalformedRecord(_)));
        assert!(err.is_structural());
        assert!(gateway.batches().is_empty());
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_queue_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, queue, manager) = setup(&dir, 0).await;
        fs::write(queue.path(), b"[{\"plat\":").unwrap();

        let err = manager.drain().await.unwrap_err();
        assert!(matches!(err, SyncError::QueueCorrupt { .. }));
        assert!(gateway.batches().is_empty());
    }
}

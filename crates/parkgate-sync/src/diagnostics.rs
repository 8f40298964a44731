//! # Diagnostics
//!
//! Operator tools for a gate whose queue or server link misbehaves.
//!
//! ## Checks and Repairs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         run_all(repair)                                 │
//! │                                                                         │
//! │  1. check_queue    → pending, malformed entries, corruption            │
//! │  2. check_server   → GET {base}/test, latency                          │
//! │                                                                         │
//! │  repair = true:                                                        │
//! │  3. corrupt file   → reset_queue   (backup, then clear)                │
//! │     bad entries    → backup_queue + remove_invalid                     │
//! │  4. server up and entries pending → force_drain                        │
//! │                                                                         │
//! │  Every repair backs the file up first:                                 │
//! │    offline_data_backup_<YYYYmmddHHMMSS>.json                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use parkgate_core::SyncOutcome;
use parkgate_store::QueueInspection;

use crate::error::SyncResult;
use crate::gateway::ServerGateway;
use crate::manager::SyncManager;
use crate::queue::SharedQueue;

// =============================================================================
// Report Types
// =============================================================================

/// Result of a server health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCheck {
    /// Whether the health endpoint answered 2xx.
    pub reachable: bool,

    /// Round-trip time of the check.
    pub latency: Duration,

    /// Failure description when unreachable.
    pub error: Option<String>,
}

/// A problem found by [`Diagnostics::run_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// The queue file is unreadable as a whole.
    QueueCorrupt(String),

    /// Some queued entries are missing required fields.
    MalformedEntries(usize),

    /// The server health check failed.
    ServerUnreachable(String),

    /// Entries are waiting for the server.
    PendingEntries(usize),
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::QueueCorrupt(reason) => write!(f, "offline queue is corrupt: {}", reason),
            Issue::MalformedEntries(n) => write!(f, "{} queued entries are malformed", n),
            Issue::ServerUnreachable(reason) => write!(f, "server unreachable: {}", reason),
            Issue::PendingEntries(n) => write!(f, "{} entries waiting to sync", n),
        }
    }
}

/// Everything one diagnostics run found and did.
#[derive(Debug, Clone)]
pub struct DiagnosticsReport {
    /// Queue scan before any repair.
    pub queue: QueueInspection,

    /// Server health.
    pub server: ServerCheck,

    /// Problems found before any repair.
    pub issues: Vec<Issue>,

    /// Backup written during repair.
    pub backup: Option<PathBuf>,

    /// Entries dropped during repair.
    pub removed: usize,

    /// Drain performed during repair.
    pub drain: Option<SyncOutcome>,
}

impl DiagnosticsReport {
    /// True when nothing needed attention.
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Operator surface over the same queue, gateway and manager the engine uses.
#[derive(Clone)]
pub struct Diagnostics {
    gateway: Arc<dyn ServerGateway>,
    queue: SharedQueue,
    manager: SyncManager,
    backup_dir: Option<PathBuf>,
}

impl Diagnostics {
    /// Creates the diagnostics surface. Backups go next to the queue unless
    /// `backup_dir` is set.
    pub fn new(
        gateway: Arc<dyn ServerGateway>,
        queue: SharedQueue,
        manager: SyncManager,
        backup_dir: Option<PathBuf>,
    ) -> Self {
        Diagnostics {
            gateway,
            queue,
            manager,
            backup_dir,
        }
    }

    /// Scans the queue file entry by entry.
    pub async fn check_queue(&self) -> SyncResult<QueueInspection> {
        self.queue.inspect().await
    }

    /// Calls the server's health endpoint.
    pub async fn check_server(&self) -> ServerCheck {
        let started = Instant::now();
        let result = self.gateway.health_check().await;
        let latency = started.elapsed();

        match result {
            Ok(()) => ServerCheck {
                reachable: true,
                latency,
                error: None,
            },
            Err(e) => ServerCheck {
                reachable: false,
                latency,
                error: Some(e.to_string()),
            },
        }
    }

    /// Drains now, waiting for any drain already in flight.
    pub async fn force_drain(&self) -> SyncResult<SyncOutcome> {
        info!("Forced drain requested");
        self.manager.drain().await
    }

    /// Copies the queue file aside.
    pub async fn backup_queue(&self) -> SyncResult<Option<PathBuf>> {
        self.queue.backup(self.backup_dir.clone()).await
    }

    /// Drops queued entries that fail validation.
    pub async fn remove_invalid(&self) -> SyncResult<usize> {
        self.queue.retain_valid().await
    }

    /// Backs the queue up, then deletes it. Ticket numbering continues.
    pub async fn reset_queue(&self) -> SyncResult<Option<PathBuf>> {
        let backup = self.queue.backup_and_clear(self.backup_dir.clone()).await?;
        warn!(backup = ?backup, "Offline queue reset");
        Ok(backup)
    }

    /// Runs every check; with `repair`, also fixes what it can.
    pub async fn run_all(&self, repair: bool) -> SyncResult<DiagnosticsReport> {
        let queue = self.check_queue().await?;
        let server = self.check_server().await;

        let mut issues = Vec::new();
        if let Some(ref reason) = queue.corrupt {
            issues.push(Issue::QueueCorrupt(reason.clone()));
        }
        if !queue.issues.is_empty() {
            issues.push(Issue::MalformedEntries(queue.issues.len()));
        }
        if let Some(ref err) = server.error {
            issues.push(Issue::ServerUnreachable(err.clone()));
        }
        let pending = queue.total.saturating_sub(queue.issues.len());
        if pending > 0 {
            issues.push(Issue::PendingEntries(pending));
        }

        for issue in &issues {
            warn!(%issue, "Diagnostics found an issue");
        }

        let mut report = DiagnosticsReport {
            queue,
            server,
            issues,
            backup: None,
            removed: 0,
            drain: None,
        };

        if !repair {
            return Ok(report);
        }

        if report.queue.corrupt.is_some() {
            report.backup = self.reset_queue().await?;
        } else if !report.queue.issues.is_empty() {
            report.backup = self.backup_queue().await?;
            report.removed = self.remove_invalid().await?;
        }

        if report.server.reachable && pending > 0 {
            report.drain = Some(self.force_drain().await?);
        }

        info!(
            issues = report.issues.len(),
            removed = report.removed,
            drained = report.drain.map(|d| d.synced_count),
            "Diagnostics finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parkgate_core::{EntryRequest, VehicleType};
    use std::fs;

    use crate::testing::ScriptedGateway;

    fn request(plate: &str) -> EntryRequest {
        EntryRequest {
            plate: plate.to_string(),
            vehicle_type: VehicleType::Motor,
            device_id: "GATE_01".to_string(),
            entry_image: None,
        }
    }

    fn setup(dir: &tempfile::TempDir, gateway: ScriptedGateway) -> (Arc<ScriptedGateway>, SharedQueue, Diagnostics) {
        let gateway = Arc::new(gateway);
        let queue = SharedQueue::open(dir.path().join("offline_data.json")).unwrap();
        let manager = SyncManager::new(gateway.clone(), queue.clone());
        let diagnostics = Diagnostics::new(
            gateway.clone(),
            queue.clone(),
            manager,
            Some(dir.path().join("backups")),
        );
        (gateway, queue, diagnostics)
    }

    #[tokio::test]
    async fn test_healthy_gate() {
        let dir = tempfile::tempdir().unwrap();
        let (_gateway, _queue, diagnostics) = setup(&dir, ScriptedGateway::new());

        let report = diagnostics.run_all(false).await.unwrap();
        assert!(report.is_healthy());
        assert!(report.server.reachable);
        assert!(!report.queue.exists);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (_gateway, queue, diagnostics) = setup(&dir, ScriptedGateway::offline());
        queue.enqueue(request("B1"), Utc::now()).await.unwrap();

        let report = diagnostics.run_all(true).await.unwrap();

        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, Issue::ServerUnreachable(_))));
        assert!(report.issues.contains(&Issue::PendingEntries(1)));
        assert!(report.drain.is_none());
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_repair_removes_malformed_entries_and_drains() {
        let dir = tempfile::tempdir().unwrap();
        let (gateway, queue, diagnostics) = setup(&dir, ScriptedGateway::new());
        fs::write(
            queue.path(),
            r#"[
                {"plat": "B1", "jenis": "Motor", "ticket_number": "OFF0001", "entry_time": "2024-03-01T08:30:00Z"},
                {"plat": "B2", "jenis": "Motor", "entry_time": "2024-03-01T08:31:00Z"}
            ]"#,
        )
        .unwrap();

        let report = diagnostics.run_all(true).await.unwrap();

        assert!(report.issues.contains(&Issue::MalformedEntries(1)));
        assert_eq!(report.removed, 1);
        let backup = report.backup.expect("repair backs up first");
        assert!(fs::read_to_string(backup).unwrap().contains("\"B2\""));

        let drain = report.drain.expect("server is up");
        assert_eq!(drain.synced_count, 1);
        assert_eq!(gateway.committed_tickets(), vec!["OFF0001"]);
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repair_resets_corrupt_queue() {
        let dir = tempfile::tempdir().unwrap();
        let (_gateway, queue, diagnostics) = setup(&dir, ScriptedGateway::new());
        fs::write(queue.path(), b"[{\"plat\": \"B1\"").unwrap();

        let report = diagnostics.run_all(true).await.unwrap();

        assert!(matches!(report.issues[0], Issue::QueueCorrupt(_)));
        let backup = report.backup.unwrap();
        assert_eq!(fs::read(backup).unwrap(), b"[{\"plat\": \"B1\"");
        assert!(!queue.path().exists());
        assert!(report.drain.is_none());
    }

    #[tokio::test]
    async fn test_reset_queue_keeps_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let (_gateway, queue, diagnostics) = setup(&dir, ScriptedGateway::new());
        queue.enqueue(request("B1"), Utc::now()).await.unwrap();

        diagnostics.reset_queue().await.unwrap();
        let (record, _) = queue.enqueue(request("B2"), Utc::now()).await.unwrap();
        assert_eq!(record.ticket_number, "OFF0002");
    }

    #[test]
    fn test_issue_display() {
        assert_eq!(
            Issue::PendingEntries(3).to_string(),
            "3 entries waiting to sync"
        );
    }
}

//! Test doubles for the gateway and the event emitter.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use parkgate_core::{EntryRecord, EntryRequest};

use crate::agent::{GateEventEmitter, SyncStatus};
use crate::error::{SyncError, SyncResult};
use crate::gateway::ServerGateway;
use crate::protocol::{BatchReceipt, ServerTicket};

/// How the scripted server answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    /// Accepts everything.
    Online,
    /// Connection refused.
    Offline,
    /// Answers with the given HTTP status.
    Rejecting(u16),
    /// Commits batches, then the response is lost.
    CommitThenTimeout,
    /// Never answers.
    Hang,
}

/// In-memory server with an idempotent batch endpoint.
pub struct ScriptedGateway {
    mode: Mutex<GatewayMode>,
    entry_calls: AtomicUsize,
    batches: Mutex<Vec<Vec<EntryRecord>>>,
    committed: Mutex<BTreeSet<String>>,
    hold: AtomicBool,
    started: Notify,
    release: Notify,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        ScriptedGateway {
            mode: Mutex::new(GatewayMode::Online),
            entry_calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
            committed: Mutex::new(BTreeSet::new()),
            hold: AtomicBool::new(false),
            started: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn offline() -> Self {
        let gateway = Self::new();
        gateway.set_mode(GatewayMode::Offline);
        gateway
    }

    pub fn set_mode(&self, mode: GatewayMode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn mode(&self) -> GatewayMode {
        *self.mode.lock().unwrap()
    }

    pub fn entry_calls(&self) -> usize {
        self.entry_calls.load(Ordering::SeqCst)
    }

    /// Every batch received, including ones whose response was lost.
    pub fn batches(&self) -> Vec<Vec<EntryRecord>> {
        self.batches.lock().unwrap().clone()
    }

    /// Distinct ticket numbers the server has stored.
    pub fn committed_tickets(&self) -> Vec<String> {
        self.committed.lock().unwrap().iter().cloned().collect()
    }

    /// Makes the next batch wait for [`release_batch`](Self::release_batch).
    pub fn hold_batches(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Resolves once a held batch has reached the server.
    pub async fn batch_started(&self) {
        self.started.notified().await;
    }

    pub fn release_batch(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    fn failure(&self, mode: GatewayMode) -> Option<SyncError> {
        match mode {
            GatewayMode::Online | GatewayMode::CommitThenTimeout | GatewayMode::Hang => None,
            GatewayMode::Offline => Some(SyncError::NetworkUnavailable(
                "connection refused".into(),
            )),
            GatewayMode::Rejecting(status) => Some(SyncError::ServerRejected {
                status,
                message: "scripted rejection".into(),
            }),
        }
    }
}

#[async_trait]
impl ServerGateway for ScriptedGateway {
    async fn submit_entry(&self, request: &EntryRequest) -> SyncResult<ServerTicket> {
        let n = self.entry_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mode = self.mode();

        if mode == GatewayMode::Hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(err) = self.failure(mode) {
            return Err(err);
        }
        if mode == GatewayMode::CommitThenTimeout {
            return Err(SyncError::Timeout(5_000));
        }

        Ok(ServerTicket {
            ticket_number: format!("TKT-{:06}", n),
            plate: Some(request.plate.clone()),
            entry_time: None,
        })
    }

    async fn submit_batch(&self, records: &[EntryRecord]) -> SyncResult<BatchReceipt> {
        self.batches.lock().unwrap().push(records.to_vec());

        if self.hold.load(Ordering::SeqCst) {
            self.started.notify_one();
            self.release.notified().await;
        }

        let mode = self.mode();
        if mode == GatewayMode::Hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(err) = self.failure(mode) {
            return Err(err);
        }

        self.committed
            .lock()
            .unwrap()
            .extend(records.iter().map(|r| r.ticket_number.clone()));

        if mode == GatewayMode::CommitThenTimeout {
            return Err(SyncError::Timeout(5_000));
        }

        Ok(BatchReceipt {
            accepted: records.len(),
        })
    }

    async fn health_check(&self) -> SyncResult<()> {
        match self.failure(self.mode()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// One emitted event.
#[derive(Debug, Clone, PartialEq)]
pub enum Emitted {
    Status { pending: usize },
    Progress { pending: usize, synced: usize },
    Error { message: String, retryable: bool },
}

/// Emitter that keeps everything it was given.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<Emitted>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<Emitted> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<(String, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Emitted::Error { message, retryable } => Some((message, retryable)),
                _ => None,
            })
            .collect()
    }
}

impl GateEventEmitter for RecordingEmitter {
    fn emit_status(&self, status: &SyncStatus) {
        self.events.lock().unwrap().push(Emitted::Status {
            pending: status.pending_count,
        });
    }

    fn emit_progress(&self, pending: usize, synced: usize) {
        self.events
            .lock()
            .unwrap()
            .push(Emitted::Progress { pending, synced });
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        self.events.lock().unwrap().push(Emitted::Error {
            message: message.to_string(),
            retryable,
        });
    }
}

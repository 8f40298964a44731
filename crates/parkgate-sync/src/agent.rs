//! # Sync Agent
//!
//! Background task that owns the drain schedule.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │   EntryProcessor                                                       │
//! │        │ DrainTrigger::request()  (try_send, capacity 1)               │
//! │        ▼                                                                │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         SyncAgent                                │  │
//! │  │                                                                  │  │
//! │  │  select! {                                                       │  │
//! │  │    interval.tick()  → drain, unless inside a backoff window      │  │
//! │  │    trigger_rx       → drain                                      │  │
//! │  │    shutdown_rx      → stop                                       │  │
//! │  │  }                                                               │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │                               ▼                                         │
//! │                  SyncManager::try_drain_report()                       │
//! │                                                                         │
//! │  AFTER A NETWORK FAILURE: periodic drains wait for the next            │
//! │  exponential backoff delay; a success resets it.                       │
//! │                                                                         │
//! │  STATUS EVENTS (GateEventEmitter):                                     │
//! │  emit_status   - SyncStatus after every drain                          │
//! │  emit_progress - { pending, synced }                                   │
//! │  emit_error    - { message, retryable }                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use parkgate_core::SyncOutcome;

use crate::config::GateConfig;
use crate::manager::{DrainReport, SyncManager};

// =============================================================================
// Sync Status
// =============================================================================

/// Current sync status for external queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStatus {
    /// Records waiting in the offline queue.
    pub pending_count: usize,

    /// Result of the most recent drain.
    pub last_outcome: Option<SyncOutcome>,

    /// Last time the queue was fully synced.
    pub last_sync: Option<DateTime<Utc>>,

    /// Last error message (cleared by a successful drain).
    pub last_error: Option<String>,

    /// Whether the server answered the last drain. `None` until contacted.
    pub server_reachable: Option<bool>,

    /// Whether periodic drains are currently held back.
    pub in_backoff: bool,
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives sync events (operator display, headless logging, tests).
pub trait GateEventEmitter: Send + Sync {
    /// Emits a sync status change event.
    fn emit_status(&self, status: &SyncStatus);

    /// Emits a sync progress event.
    fn emit_progress(&self, pending: usize, synced: usize);

    /// Emits an error event.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter for headless use.
pub struct NoOpEmitter;

impl GateEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_progress(&self, _pending: usize, _synced: usize) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Drain Trigger
// =============================================================================

/// Non-blocking request for a drain.
///
/// The channel holds at most one pending request, so a burst of entries
/// results in a single drain.
#[derive(Debug, Clone)]
pub struct DrainTrigger {
    tx: mpsc::Sender<()>,
}

impl DrainTrigger {
    /// Creates a trigger and the receiver the agent listens on.
    pub fn channel() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (DrainTrigger { tx }, rx)
    }

    /// Requests a drain. Returns false when one was already pending or no
    /// agent is listening.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("Drain already requested");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }
}

// =============================================================================
// Agent Settings
// =============================================================================

/// Timing of the drain schedule.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Interval between periodic drains.
    pub interval: Duration,

    /// First delay after a failed drain.
    pub initial_backoff: Duration,

    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl From<&GateConfig> for AgentSettings {
    fn from(config: &GateConfig) -> Self {
        AgentSettings {
            interval: config.sync_interval(),
            initial_backoff: Duration::from_millis(config.sync.initial_backoff_ms),
            max_backoff: Duration::from_secs(config.sync.max_backoff_secs),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        AgentSettings::from(&GateConfig::default())
    }
}

// =============================================================================
// Sync Agent
// =============================================================================

/// Runs drains on a schedule and on request.
pub struct SyncAgent {
    manager: SyncManager,
    settings: AgentSettings,
    status: Arc<RwLock<SyncStatus>>,
    emitter: Arc<dyn GateEventEmitter>,
    trigger_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
    backoff: ExponentialBackoff,
    retry_at: Option<Instant>,
}

impl SyncAgent {
    /// Creates an agent listening on `trigger_rx`.
    pub fn new(
        manager: SyncManager,
        settings: AgentSettings,
        trigger_rx: mpsc::Receiver<()>,
        emitter: Arc<dyn GateEventEmitter>,
    ) -> (Self, mpsc::Sender<()>, Arc<RwLock<SyncStatus>>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let status = Arc::new(RwLock::new(SyncStatus::default()));
        let backoff = Self::create_backoff(&settings);

        let agent = SyncAgent {
            manager,
            settings,
            status: status.clone(),
            emitter,
            trigger_rx,
            shutdown_rx,
            backoff,
            retry_at: None,
        };

        (agent, shutdown_tx, status)
    }

    /// Spawns the agent on the current runtime.
    pub fn spawn(
        manager: SyncManager,
        settings: AgentSettings,
        trigger_rx: mpsc::Receiver<()>,
        emitter: Arc<dyn GateEventEmitter>,
    ) -> SyncAgentHandle {
        let (agent, shutdown_tx, status) = Self::new(manager, settings, trigger_rx, emitter);
        let task = tokio::spawn(agent.run());
        SyncAgentHandle::new(shutdown_tx, status, task)
    }

    /// Main loop. Runs until shutdown is signalled or the handle is dropped.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            "Sync agent starting"
        );

        self.refresh_pending().await;

        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.in_backoff() {
                        debug!("In backoff window, skipping periodic drain");
                        continue;
                    }
                    self.run_drain().await;
                }

                Some(()) = self.trigger_rx.recv() => {
                    self.run_drain().await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Sync agent received shutdown");
                    break;
                }
            }
        }

        info!("Sync agent stopped");
    }

    fn in_backoff(&self) -> bool {
        self.retry_at.is_some_and(|at| Instant::now() < at)
    }

    async fn refresh_pending(&self) {
        match self.manager.pending().await {
            Ok(pending) => self.status.write().await.pending_count = pending,
            Err(e) => {
                error!(error = %e, "Cannot read offline queue");
                self.status.write().await.last_error = Some(e.to_string());
                self.emitter.emit_error(&e.to_string(), false);
            }
        }
    }

    async fn run_drain(&mut self) {
        match self.manager.try_drain_report().await {
            None => debug!("Drain already in flight"),
            Some(Ok(report)) => self.record_report(report).await,
            Some(Err(e)) => {
                error!(kind = e.kind(), error = %e, "Drain failed");
                let snapshot = {
                    let mut s = self.status.write().await;
                    s.last_error = Some(e.to_string());
                    s.clone()
                };
                self.emitter.emit_error(&e.to_string(), false);
                self.emitter.emit_status(&snapshot);
            }
        }
    }

    async fn record_report(&mut self, report: DrainReport) {
        let outcome = report.outcome;

        match report.network_error {
            Some(ref e) => {
                let delay = self.backoff.next_backoff();
                self.retry_at = delay.map(|d| Instant::now() + d);
                warn!(
                    kind = e.kind(),
                    retry_in_ms = delay.map(|d| d.as_millis() as u64),
                    "Server unreachable, backing off"
                );
                self.emitter.emit_error(&e.to_string(), true);
            }
            None => {
                self.backoff.reset();
                self.retry_at = None;
            }
        }

        let snapshot = {
            let mut s = self.status.write().await;
            s.pending_count = outcome.remaining_count;
            s.last_outcome = Some(outcome);
            s.in_backoff = self.retry_at.is_some();
            if report.contacted_server {
                s.server_reachable = Some(report.network_error.is_none());
            }
            match report.network_error {
                Some(e) => s.last_error = Some(e.to_string()),
                None => {
                    s.last_error = None;
                    if outcome.is_fully_synced() {
                        s.last_sync = Some(Utc::now());
                    }
                }
            }
            s.clone()
        };

        self.emitter
            .emit_progress(outcome.remaining_count, outcome.synced_count);
        self.emitter.emit_status(&snapshot);
    }

    /// Creates the exponential backoff configuration.
    fn create_backoff(settings: &AgentSettings) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: settings.initial_backoff,
            current_interval: settings.initial_backoff,
            max_interval: settings.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None, // No limit on total time
            ..Default::default()
        }
    }
}

// =============================================================================
// Agent Handle (for external control)
// =============================================================================

/// Handle for controlling a running SyncAgent from outside.
pub struct SyncAgentHandle {
    shutdown_tx: mpsc::Sender<()>,
    status: Arc<RwLock<SyncStatus>>,
    task: JoinHandle<()>,
}

impl SyncAgentHandle {
    pub(crate) fn new(
        shutdown_tx: mpsc::Sender<()>,
        status: Arc<RwLock<SyncStatus>>,
        task: JoinHandle<()>,
    ) -> Self {
        SyncAgentHandle {
            shutdown_tx,
            status,
            task,
        }
    }

    /// Gets the current sync status.
    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Signals the agent to stop and waits for it. An in-flight drain is
    /// allowed to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            error!(error = %e, "Sync agent task failed");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

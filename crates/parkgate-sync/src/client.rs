//! # Gate Client
//!
//! Composition root: one configured gate with its queue, gateway,
//! processor, manager, agent and diagnostics.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          GateClient                                     │
//! │                                                                         │
//! │   GateConfig ──► HttpGateway (or injected ServerGateway)               │
//! │              ──► SharedQueue (queue file + counter)                    │
//! │                                                                         │
//! │   EntryProcessor ─┐                                                    │
//! │   SyncManager ────┼── share the gateway and the queue                  │
//! │   Diagnostics ────┘                                                    │
//! │                                                                         │
//! │   DrainTrigger ──► SyncAgent (after start_agent)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Instances are independent: two clients with different queue paths can
//! run side by side in one process.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use parkgate_core::{EntryImage, SyncOutcome, TicketData, VehicleType};

use crate::agent::{
    AgentSettings, DrainTrigger, GateEventEmitter, NoOpEmitter, SyncAgent, SyncAgentHandle,
    SyncStatus,
};
use crate::config::GateConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{HttpGateway, ServerGateway};
use crate::manager::SyncManager;
use crate::processor::EntryProcessor;
use crate::queue::SharedQueue;

/// A fully wired gate.
pub struct GateClient {
    config: Arc<GateConfig>,
    queue: SharedQueue,
    processor: EntryProcessor,
    manager: SyncManager,
    diagnostics: Diagnostics,
    emitter: Arc<dyn GateEventEmitter>,
    trigger_rx: Option<mpsc::Receiver<()>>,
    agent: Option<SyncAgentHandle>,
}

impl GateClient {
    /// Builds a client that talks HTTP to the configured server.
    pub fn new(config: GateConfig) -> SyncResult<Self> {
        GateClientBuilder::new(config).build()
    }

    /// Returns the configuration this client was built from.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Processes one vehicle arrival. See [`EntryProcessor::process_entry`].
    pub async fn process_entry(
        &self,
        plate: &str,
        vehicle_type: VehicleType,
        image: Option<EntryImage>,
    ) -> SyncResult<TicketData> {
        self.processor.process_entry(plate, vehicle_type, image).await
    }

    /// Drains the offline queue now.
    pub async fn drain(&self) -> SyncResult<SyncOutcome> {
        self.manager.drain().await
    }

    /// Records waiting in the offline queue.
    pub async fn pending(&self) -> SyncResult<usize> {
        self.queue.len().await
    }

    /// Operator diagnostics.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Starts the background agent. No-op when sync is disabled or the
    /// agent already runs.
    pub fn start_agent(&mut self) -> SyncResult<()> {
        if !self.config.sync.enabled {
            info!("Background sync is disabled");
            return Ok(());
        }
        if self.agent.is_some() {
            return Ok(());
        }

        let trigger_rx = self
            .trigger_rx
            .take()
            .ok_or_else(|| SyncError::Internal("Drain trigger already consumed".into()))?;

        self.agent = Some(SyncAgent::spawn(
            self.manager.clone(),
            AgentSettings::from(self.config.as_ref()),
            trigger_rx,
            self.emitter.clone(),
        ));

        info!(device_id = %self.config.device_id(), "Background sync started");
        Ok(())
    }

    /// Current sync status. Without a running agent, only the pending count
    /// is filled in.
    pub async fn status(&self) -> SyncResult<SyncStatus> {
        match self.agent {
            Some(ref handle) => Ok(handle.status().await),
            None => Ok(SyncStatus {
                pending_count: self.pending().await?,
                ..Default::default()
            }),
        }
    }

    /// Stops the background agent, letting an in-flight drain finish.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.agent.take() {
            handle.shutdown().await;
        }
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating GateClient with options.
pub struct GateClientBuilder {
    config: GateConfig,
    gateway: Option<Arc<dyn ServerGateway>>,
    emitter: Option<Arc<dyn GateEventEmitter>>,
}

impl GateClientBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: GateConfig) -> Self {
        GateClientBuilder {
            config,
            gateway: None,
            emitter: None,
        }
    }

    /// Sets the server gateway (default: HTTP to `server.base_url`).
    pub fn with_gateway(mut self, gateway: Arc<dyn ServerGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn GateEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Builds the GateClient.
    pub fn build(self) -> SyncResult<GateClient> {
        self.config.validate()?;

        let gateway: Arc<dyn ServerGateway> = match self.gateway {
            Some(gateway) => gateway,
            None => Arc::new(HttpGateway::new(&self.config)?),
        };
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        let queue_path = self.config.queue_path();
        let queue = SharedQueue::open(&queue_path)?;
        info!(queue = %queue_path.display(), "Offline queue opened");

        let (trigger, trigger_rx) = DrainTrigger::channel();
        let processor = EntryProcessor::new(
            gateway.clone(),
            queue.clone(),
            trigger,
            emitter.clone(),
            self.config.device_id(),
            self.config.request_timeout() + self.config.connect_timeout(),
        );
        let manager = SyncManager::new(gateway.clone(), queue.clone())
            .with_batch_timeout(self.config.request_timeout() + self.config.connect_timeout());
        let diagnostics = Diagnostics::new(gateway, queue.clone(), manager.clone(), None);

        Ok(GateClient {
            config: Arc::new(self.config),
            queue,
            processor,
            manager,
            diagnostics,
            emitter,
            trigger_rx: Some(trigger_rx),
            agent: None,
        })
    }
}

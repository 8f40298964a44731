//! Sync events for a headless gate: written to the log.

use tracing::{debug, error, info, warn};

use parkgate_sync::{GateEventEmitter, SyncStatus};

/// Forwards sync events to `tracing`.
pub struct LogEmitter;

impl GateEventEmitter for LogEmitter {
    fn emit_status(&self, status: &SyncStatus) {
        debug!(
            pending = status.pending_count,
            reachable = ?status.server_reachable,
            in_backoff = status.in_backoff,
            "sync:status"
        );
    }

    fn emit_progress(&self, pending: usize, synced: usize) {
        info!(pending, synced, "sync:progress");
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        if retryable {
            warn!(retryable, "sync:error {}", message);
        } else {
            error!(retryable, "sync:error {}", message);
        }
    }
}

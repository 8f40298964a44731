//! # ParkGate Gate Client
//!
//! Edge runtime for one entry gate.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (stderr, so stdout stays a clean ticket stream)
//! 2. Load `GateConfig` (`PARKGATE_CONFIG` or the platform config path)
//! 3. Build the `GateClient` and start background sync
//! 4. Read commands from stdin until EOF, `QUIT` or a shutdown signal
//! 5. Stop the sync agent, letting an in-flight drain finish

mod command;
mod emitter;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use parkgate_sync::{GateClient, GateClientBuilder, GateConfig, SyncError};

use crate::command::Command;
use crate::emitter::LogEmitter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = load_config()?;
    info!(
        device_id = %config.device_id(),
        server = %config.server.base_url,
        "Starting gate client"
    );

    let mut client = GateClientBuilder::new(config)
        .with_emitter(Arc::new(LogEmitter))
        .build()
        .context("failed to build gate client")?;
    client.start_agent()?;

    tokio::select! {
        result = run_commands(&client) => {
            if let Err(e) = result {
                error!(error = ?e, "Command loop failed");
            }
        }
        _ = shutdown_signal() => {}
    }

    client.shutdown().await;
    info!("Gate client stopped");

    // The blocking stdin read cannot be cancelled; exit instead of waiting
    // for runtime teardown.
    std::process::exit(0)
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=parkgate_sync=trace` - Trace the sync engine only
/// - Default: `info,parkgate=debug`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,parkgate=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the config, writing the defaults out on first run.
fn load_config() -> Result<GateConfig> {
    let path = std::env::var_os("PARKGATE_CONFIG")
        .map(PathBuf::from)
        .or_else(GateConfig::default_config_path);

    let exists = path.as_ref().map(|p| p.exists()).unwrap_or(false);
    let config = GateConfig::load(path.clone()).context("failed to load gate config")?;

    if !exists {
        if let Err(e) = config.save(path) {
            warn!(error = ?e, "Could not write default config");
        }
    }
    Ok(config)
}

/// JSON line printed when a command fails. The loop keeps reading.
fn error_line(err: &SyncError) -> Value {
    json!({ "error": err.to_string(), "kind": err.kind() })
}

async fn run_commands(client: &GateClient) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "Ignoring input line");
                println!("{}", json!({ "error": e.to_string() }));
                continue;
            }
        };

        match command {
            Command::Entry {
                plate,
                vehicle_type,
                image,
            } => match client.process_entry(&plate, vehicle_type, image).await {
                Ok(ticket) => println!("{}", serde_json::to_string(&ticket)?),
                Err(e) => {
                    error!(error = ?e, plate = %plate, "Entry not processed");
                    println!("{}", error_line(&e));
                }
            },
            Command::Sync => match client.drain().await {
                Ok(outcome) => println!("{}", serde_json::to_string(&outcome)?),
                Err(e) => {
                    error!(error = ?e, "Sync failed");
                    println!("{}", error_line(&e));
                }
            },
            Command::Status => {
                let status = match client.status().await {
                    Ok(status) => status,
                    Err(e) => {
                        error!(error = ?e, "Status unavailable");
                        println!("{}", error_line(&e));
                        continue;
                    }
                };
                println!(
                    "{}",
                    json!({
                        "pending": status.pending_count,
                        "last_sync": status.last_sync,
                        "last_error": status.last_error,
                        "server_reachable": status.server_reachable,
                        "in_backoff": status.in_backoff,
                    })
                );
            }
            Command::Diagnose { repair } => {
                let report = match client.diagnostics().run_all(repair).await {
                    Ok(report) => report,
                    Err(e) => {
                        error!(error = ?e, repair, "Diagnostics failed");
                        println!("{}", error_line(&e));
                        continue;
                    }
                };
                println!(
                    "{}",
                    json!({
                        "healthy": report.is_healthy(),
                        "issues": report.issues.iter().map(|i| i.to_string()).collect::<Vec<_>>(),
                        "server_reachable": report.server.reachable,
                        "latency_ms": report.server.latency.as_millis() as u64,
                        "backup": report.backup.map(|p| p.display().to_string()),
                        "removed": report.removed,
                        "synced": report.drain.map(|d| d.synced_count),
                    })
                );
            }
            Command::Quit => break,
        }
    }

    Ok(())
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = ?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping gate client...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_line_names_the_failure() {
        let err = SyncError::QueueCorrupt {
            path: PathBuf::from("offline_data.json"),
            reason: "EOF while parsing".into(),
        };

        let line = error_line(&err);
        assert_eq!(line["kind"], "queue_corrupt");
        assert!(line["error"].as_str().unwrap().contains("EOF while parsing"));
    }
}

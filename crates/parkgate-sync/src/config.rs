//! # Gate Configuration
//!
//! Configuration management for the gate client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PARKGATE_DEVICE_ID=GATE_01                                         │
//! │     PARKGATE_SERVER_URL=http://192.168.2.6:8000/api                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/parkgate/parkgate.toml (Linux)                           │
//! │     ~/Library/Application Support/com.parkgate.gate/parkgate.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     auto-generated device id, sync every 30 s                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # parkgate.toml
//! [device]
//! id = "GATE_01"
//! name = "Entry Gate 1"
//!
//! [server]
//! base_url = "http://192.168.2.6:8000/api"
//! request_timeout_secs = 5
//! connect_timeout_secs = 3
//!
//! [queue]
//! path = "/var/lib/parkgate/offline_data.json"
//!
//! [sync]
//! enabled = true
//! interval_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use parkgate_core::validation::validate_device_id;
use parkgate_store::QUEUE_FILE_NAME;

use crate::error::{SyncError, SyncResult};

/// Default config file name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "parkgate.toml";

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Gate identifier sent with every entry.
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable gate name (e.g., "Entry Gate 1").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Entry Gate".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// Central server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// API root, e.g. `http://192.168.2.6:8000/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://192.168.2.6:8000/api".to_string()
}
fn default_request_timeout() -> u64 {
    5
}
fn default_connect_timeout() -> u64 {
    3
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Queue Settings
// =============================================================================

/// Offline queue location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Queue file. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Background drain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Run the background agent at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between periodic drains (seconds).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// First backoff after a failed drain (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_interval() -> u64 {
    30
}
fn default_initial_backoff() -> u64 {
    1000
}
fn default_max_backoff() -> u64 {
    300
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            enabled: true,
            interval_secs: default_interval(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Gate Configuration
// =============================================================================

/// Complete gate client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Gate identity.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Central server.
    #[serde(default)]
    pub server: ServerSettings,

    /// Offline queue.
    #[serde(default)]
    pub queue: QueueSettings,

    /// Background drain.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl GateConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (parkgate.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading gate config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load gate config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Gate config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::MissingDeviceId);
        }
        validate_device_id(&self.device.id)
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        self.server_url()?;

        if self.server.request_timeout_secs == 0 || self.server.connect_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "server timeouts must be greater than 0".into(),
            ));
        }

        if self.sync.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("PARKGATE_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(name) = lookup("PARKGATE_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Some(url) = lookup("PARKGATE_SERVER_URL") {
            debug!(url = %url, "Overriding server URL from environment");
            self.server.base_url = url;
        }

        if let Some(path) = lookup("PARKGATE_QUEUE_PATH") {
            self.queue.path = Some(PathBuf::from(path));
        }

        if let Some(interval) = lookup("PARKGATE_SYNC_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(secs) => self.sync.interval_secs = secs,
                Err(_) => warn!(value = %interval, "Ignoring invalid PARKGATE_SYNC_INTERVAL_SECS"),
            }
        }

        if let Some(enabled) = lookup("PARKGATE_SYNC_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.sync.enabled = true,
                "0" | "false" | "no" | "off" => self.sync.enabled = false,
                _ => warn!(value = %enabled, "Ignoring invalid PARKGATE_SYNC_ENABLED"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "parkgate", "gate")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the device ID.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Parses the server base URL, requiring http or https.
    pub fn server_url(&self) -> SyncResult<Url> {
        let url = Url::parse(&self.server.base_url)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(SyncError::InvalidUrl(format!(
                "Server URL must use http or https, got: {}",
                other
            ))),
        }
    }

    /// Resolved queue file path.
    pub fn queue_path(&self) -> PathBuf {
        if let Some(ref path) = self.queue.path {
            return path.clone();
        }
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join(QUEUE_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(QUEUE_FILE_NAME))
    }

    /// Whole-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// TCP connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.server.connect_timeout_secs)
    }

    /// Interval between periodic drains.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }
}

//! Configuration file support for the fabric adapter.
//!
//! Loads adapter settings from TOML. Every field has a default, so an empty
//! or missing file yields a working configuration.
//! Default location: /etc/fabric-adapter/fabric-adapter.toml

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::lookup::ControllerInfo;
use crate::pusher::PayloadEncoding;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fabric-adapter/fabric-adapter.toml";

/// Synchronizer behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynchronizerConfig {
    /// Push translated artifacts; when false, translate only.
    #[serde(default = "default_post_enable")]
    pub post_enable: bool,

    /// Per-request timeout of REST and gNMI pushes, in seconds
    #[serde(default = "default_post_timeout")]
    pub post_timeout_secs: u64,

    /// Fixed interval between retries, in seconds
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// Skip netconfig pushes whose content has not changed
    #[serde(default = "default_partial_update_enable")]
    pub partial_update_enable: bool,
}

/// Where SIDs are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidBackend {
    /// Shared Redis server.
    #[default]
    Redis,
    /// Process memory (single replica, lost on restart).
    Memory,
}

/// SID store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidStoreConfig {
    /// Backend kind
    #[serde(default)]
    pub backend: SidBackend,

    /// Redis URL, used by the redis backend
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

/// Chassis config push settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChassisConfigSettings {
    /// gNMI target name
    #[serde(default = "default_chassis_target")]
    pub target: String,

    /// gNMI path the chassis config is set at
    #[serde(default = "default_chassis_path")]
    pub path: String,

    /// Payload encoding inside the gNMI value
    #[serde(default)]
    pub payload_encoding: PayloadEncoding,
}

/// Complete adapter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Synchronizer behaviour
    #[serde(default)]
    pub synchronizer: SynchronizerConfig,

    /// SID store settings
    #[serde(default)]
    pub sid_store: SidStoreConfig,

    /// Chassis push settings
    #[serde(default)]
    pub chassis: ChassisConfigSettings,

    /// Controller of each fabric
    #[serde(default)]
    pub fabrics: BTreeMap<String, ControllerInfo>,
}

// Default functions
fn default_post_enable() -> bool {
    true
}

fn default_post_timeout() -> u64 {
    10
}

fn default_retry_interval() -> u64 {
    5
}

fn default_partial_update_enable() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_chassis_target() -> String {
    "stratum".to_string()
}

fn default_chassis_path() -> String {
    "/".to_string()
}

// Default implementations
impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            post_enable: default_post_enable(),
            post_timeout_secs: default_post_timeout(),
            retry_interval_secs: default_retry_interval(),
            partial_update_enable: default_partial_update_enable(),
        }
    }
}

impl Default for SidStoreConfig {
    fn default() -> Self {
        Self {
            backend: SidBackend::default(),
            redis_url: default_redis_url(),
        }
    }
}

impl Default for ChassisConfigSettings {
    fn default() -> Self {
        Self {
            target: default_chassis_target(),
            path: default_chassis_path(),
            payload_encoding: PayloadEncoding::default(),
        }
    }
}

impl AdapterConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Push timeout as Duration
    pub fn post_timeout(&self) -> Duration {
        Duration::from_secs(self.synchronizer.post_timeout_secs)
    }

    /// Retry interval as Duration
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.synchronizer.retry_interval_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.synchronizer.post_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "synchronizer.post_timeout_secs",
                "must be > 0",
            ));
        }

        if self.sid_store.backend == SidBackend::Redis && self.sid_store.redis_url.is_empty() {
            return Err(ConfigError::invalid(
                "sid_store.redis_url",
                "must be set for the redis backend",
            ));
        }

        for (fabric, info) in &self.fabrics {
            if info.address.is_empty() {
                return Err(ConfigError::invalid(
                    format!("fabrics.{}.address", fabric),
                    "must not be empty",
                ));
            }
            if info.port == 0 {
                return Err(ConfigError::invalid(
                    format!("fabrics.{}.port", fabric),
                    "must be > 0",
                ));
            }
        }

        Ok(())
    }
}

//! Configuration schema for streams-cache
//!
//! Configuration is stored at `~/.config/streams-cache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Worker version and core assets
    pub worker: WorkerConfig,

    /// Network settings
    pub network: NetworkConfig,

    /// Cache storage settings
    pub storage: StorageConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append lifecycle events to the event log
    pub event_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            event_log: true,
        }
    }
}

/// Worker version settings
///
/// The cache name is derived from these: `{cache_prefix}-v{version}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Prefix shared by every cache this application owns
    pub cache_prefix: String,

    /// Version baked into the cache name
    pub version: String,

    /// Application shell, cached all-or-nothing at install time
    pub core_assets: Vec<String>,
}

impl WorkerConfig {
    /// Name of the cache owned by this worker version
    pub fn cache_name(&self) -> String {
        format!("{}-v{}", self.cache_prefix, self.version)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_prefix: "streams-cache".to_string(),
            version: "13.2".to_string(),
            core_assets: vec![
                "/index.html".to_string(),
                "/polygol.html".to_string(),
                "/streams.png".to_string(),
                "/favicon.png".to_string(),
            ],
        }
    }
}

/// Network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Origin that relative asset paths resolve against
    pub origin: String,

    /// Hosts that are always fetched live and never cached
    pub bypass_hosts: Vec<String>,

    /// User-Agent header sent with network requests
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            bypass_hosts: vec![
                "api.open-meteo.com".to_string(),
                "nominatim.openstreetmap.org".to_string(),
            ],
            user_agent: format!("streams-cache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Cache storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Entries persisted under the state directory
    Disk,
    /// Entries live only for the lifetime of the process
    Memory,
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend holds the caches
    pub backend: StorageBackend,

    /// State directory override (registration, event log, disk caches)
    pub state_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Disk,
            state_dir: None,
        }
    }
}

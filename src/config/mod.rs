//! Configuration management for streams-cache

pub mod schema;

pub use schema::{Config, StorageBackend};

use crate::error::{StreamsError, StreamsResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("streams-cache")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> StreamsResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> StreamsResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StreamsError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| StreamsError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> StreamsResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            StreamsError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    async fn ensure_config_dir(&self) -> StreamsResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StreamsError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Locations of everything streams-cache persists between runs
#[derive(Debug, Clone)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    /// Resolve the state directory.
    ///
    /// Precedence: explicit override (CLI / env), then `storage.state_dir`
    /// from config, then the platform data directory.
    pub fn resolve(override_dir: Option<&Path>, config: &Config) -> Self {
        let root = override_dir
            .map(Path::to_path_buf)
            .or_else(|| config.storage.state_dir.clone())
            .unwrap_or_else(Self::default_root);
        Self { root }
    }

    /// Use an explicit root directory
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn default_root() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("streams-cache")
    }

    /// State directory root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persisted registration record
    pub fn registration(&self) -> PathBuf {
        self.root.join("registration.json")
    }

    /// Lifecycle event log
    pub fn event_log(&self) -> PathBuf {
        self.root.join("events.log")
    }

    /// Directory of the disk cache backend
    pub fn caches_dir(&self) -> PathBuf {
        self.root.join("caches")
    }

    /// Ensure the state directories exist
    pub async fn ensure(&self) -> StreamsResult<()> {
        for dir in [self.root.clone(), self.caches_dir()] {
            fs::create_dir_all(&dir).await.map_err(|e| {
                StreamsError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }
        Ok(())
    }
}

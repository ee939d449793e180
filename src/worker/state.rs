//! Worker records and registration persistence

use crate::config::Config;
use crate::error::{StreamsError, StreamsResult};
use crate::worker::clients::ClientRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

/// Lifecycle state of a worker version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Populating its cache with the core assets
    Installing,
    /// Installed and waiting to take over
    Installed,
    /// Purging stale caches and claiming clients
    Activating,
    /// Serving requests
    Activated,
    /// Failed to install or replaced by a newer version
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "waiting"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "active"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

/// One worker version and the settings baked into it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Worker id
    pub id: Uuid,
    /// Cache owned by this version
    pub cache_name: String,
    /// Assets cached all-or-nothing at install time
    pub core_assets: Vec<String>,
    /// Hosts never cached
    pub bypass_hosts: Vec<String>,
    /// Current lifecycle state
    pub state: WorkerState,
    /// When install completed
    pub installed_at: Option<DateTime<Utc>>,
    /// When activation completed
    pub activated_at: Option<DateTime<Utc>>,
}

impl WorkerRecord {
    /// Create a record for a version that has not installed yet
    pub fn new(cache_name: impl Into<String>, core_assets: Vec<String>, bypass_hosts: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            cache_name: cache_name.into(),
            core_assets,
            bypass_hosts,
            state: WorkerState::Installing,
            installed_at: None,
            activated_at: None,
        }
    }

    /// Create a record for the version described by config
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.worker.cache_name(),
            config.worker.core_assets.clone(),
            config.network.bypass_hosts.clone(),
        )
    }
}

/// Persisted registration: active and waiting workers plus attached clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Registration {
    /// Worker serving requests
    pub active: Option<WorkerRecord>,
    /// Installed worker waiting to take over
    pub waiting: Option<WorkerRecord>,
    /// Attached clients
    pub clients: Vec<ClientRecord>,
    /// Last time the record was saved
    pub updated_at: Option<DateTime<Utc>>,
}

impl Registration {
    /// Load from file, or an empty registration if the file is missing
    pub async fn load(path: &Path) -> StreamsResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            StreamsError::io(format!("reading registration {}", path.display()), e)
        })?;

        serde_json::from_str(&content).map_err(|e| StreamsError::StorageCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save to file
    pub async fn save(&mut self, path: &Path) -> StreamsResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StreamsError::io("creating state directory", e))?;
        }

        self.updated_at = Some(Utc::now());
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await.map_err(|e| {
            StreamsError::io(format!("writing registration {}", path.display()), e)
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn record_from_config() {
        let record = WorkerRecord::from_config(&Config::default());
        assert_eq!(record.cache_name, "streams-cache-v13.2");
        assert_eq!(record.state, WorkerState::Installing);
        assert_eq!(record.core_assets[0], "/index.html");
        assert!(record.installed_at.is_none());
    }

    #[test]
    fn state_display() {
        assert_eq!(WorkerState::Installed.to_string(), "waiting");
        assert_eq!(WorkerState::Activated.to_string(), "active");
    }

    #[tokio::test]
    async fn missing_file_is_empty_registration() {
        let dir = TempDir::new().unwrap();
        let reg = Registration::load(&dir.path().join("registration.json"))
            .await
            .unwrap();
        assert!(reg.active.is_none());
        assert!(reg.clients.is_empty());
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("registration.json");

        let mut active = WorkerRecord::from_config(&Config::default());
        active.state = WorkerState::Activated;
        let mut reg = Registration {
            active: Some(active.clone()),
            ..Default::default()
        };
        reg.save(&path).await.unwrap();

        let loaded = Registration::load(&path).await.unwrap();
        let loaded_active = loaded.active.unwrap();
        assert_eq!(loaded_active.id, active.id);
        assert_eq!(loaded_active.state, WorkerState::Activated);
        assert!(loaded.updated_at.is_some());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registration.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let err = Registration::load(&path).await.unwrap_err();
        assert!(matches!(err, StreamsError::StorageCorrupt { .. }));
    }
}

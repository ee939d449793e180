//! Everything a command needs: config, state locations and capabilities

use crate::config::{Config, ConfigManager, StatePaths};
use crate::error::{StreamsError, StreamsResult};
use crate::events::EventLog;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::storage::{create_storage, CacheStorage};
use crate::worker::Registry;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Resolved configuration and state for one CLI invocation
pub struct Environment {
    /// Loaded configuration
    pub config: Config,
    /// Where the configuration was loaded from
    pub config_path: PathBuf,
    /// State directory layout
    pub paths: StatePaths,
    storage: Arc<dyn CacheStorage>,
}

impl Environment {
    /// Build from loaded config
    pub fn new(config: Config, manager: &ConfigManager, paths: StatePaths) -> Self {
        let storage = create_storage(&config, &paths);
        Self {
            config,
            config_path: manager.path().to_path_buf(),
            paths,
            storage,
        }
    }

    /// Application origin that relative URLs resolve against
    pub fn origin(&self) -> StreamsResult<Url> {
        Url::parse(&self.config.network.origin).map_err(|e| StreamsError::ConfigValue {
            key: "network.origin".to_string(),
            reason: e.to_string(),
        })
    }

    /// Cache storage selected in config
    pub fn storage(&self) -> Arc<dyn CacheStorage> {
        Arc::clone(&self.storage)
    }

    /// Network fetcher
    pub fn fetcher(&self) -> StreamsResult<Arc<dyn Fetcher>> {
        Ok(Arc::new(HttpFetcher::new(
            self.origin()?,
            self.config.network.user_agent.clone(),
        )))
    }

    /// Lifecycle event log
    pub fn events(&self) -> EventLog {
        EventLog::new(&self.config, &self.paths)
    }

    /// Load the persisted registry
    pub async fn registry(&self) -> StreamsResult<Registry> {
        self.paths.ensure().await?;
        Registry::load(
            self.paths.registration(),
            self.origin()?,
            self.storage(),
            self.fetcher()?,
            self.events(),
        )
        .await
    }
}

//! Lifecycle event log
//!
//! Appends one JSON object per line to `<state dir>/events.log`: installs,
//! activations, stale cache deletions and control messages.

use crate::config::{Config, StatePaths};
use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// File-based event logger that appends JSON lines
#[derive(Debug, Clone)]
pub struct EventLog {
    enabled: bool,
    path: PathBuf,
}

impl EventLog {
    /// Create an event logger from config
    pub fn new(config: &Config, paths: &StatePaths) -> Self {
        Self {
            enabled: config.general.event_log,
            path: paths.event_log(),
        }
    }

    /// Logger that drops every event
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
        }
    }

    /// Log file location
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Record an event.
    ///
    /// IO failures are logged and swallowed; the event log never fails a
    /// lifecycle step.
    pub async fn record(&self, event: &str, data: Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write event log: {}", e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read back the most recent `limit` events (oldest first)
    pub async fn tail(&self, limit: usize) -> Vec<Value> {
        let Ok(content) = tokio::fs::read_to_string(&self.path).await else {
            return vec![];
        };
        let events: Vec<Value> = content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        let skip = events.len().saturating_sub(limit);
        events.into_iter().skip(skip).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_log(dir: &TempDir, enabled: bool) -> EventLog {
        EventLog {
            enabled,
            path: dir.path().join("events.log"),
        }
    }

    #[tokio::test]
    async fn writes_json_line() {
        let dir = TempDir::new().unwrap();
        let log = test_log(&dir, true);

        log.record("worker.installed", json!({"cache": "streams-cache-v13.2"}))
            .await;

        let content = tokio::fs::read_to_string(&log.path).await.unwrap();
        let parsed: Value = serde_json::from_str(content.trim()).unwrap();

        assert_eq!(parsed["event"], "worker.installed");
        assert_eq!(parsed["data"]["cache"], "streams-cache-v13.2");
        assert!(parsed["timestamp"].is_string());
    }

    #[tokio::test]
    async fn tail_returns_latest() {
        let dir = TempDir::new().unwrap();
        let log = test_log(&dir, true);

        for i in 0..5 {
            log.record("event", json!({ "n": i })).await;
        }

        let tail = log.tail(2).await;
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0]["data"]["n"], 3);
        assert_eq!(tail[1]["data"]["n"], 4);
    }

    #[tokio::test]
    async fn skips_when_disabled() {
        let dir = TempDir::new().unwrap();
        let log = test_log(&dir, false);

        log.record("should.not.appear", json!({})).await;

        assert!(!log.path.exists());
        assert!(EventLog::disabled().tail(10).await.is_empty());
    }
}

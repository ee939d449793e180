//! Control messages posted by the application

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A recognised control message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ControlMessage {
    /// Activate a waiting worker without waiting for clients to close
    #[serde(rename = "skipWaiting")]
    SkipWaiting,

    /// Best-effort caching of an installed app's files
    #[serde(rename = "cache-app")]
    CacheApp {
        #[serde(default)]
        files: Option<Vec<String>>,
    },

    /// Best-effort removal of an uninstalled app's files
    #[serde(rename = "uncache-app")]
    UncacheApp {
        #[serde(rename = "filesToDelete", default)]
        files_to_delete: Option<Vec<String>>,
    },
}

impl ControlMessage {
    /// Interpret a raw message.
    ///
    /// Returns `None` for anything that should be ignored: non-objects,
    /// unknown actions, missing or empty file lists.
    pub fn parse(message: &Value) -> Option<Self> {
        let parsed = match Self::deserialize(message) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Ignoring message: {}", e);
                return None;
            }
        };

        match &parsed {
            Self::CacheApp { files: Some(files) } if !files.is_empty() => Some(parsed),
            Self::UncacheApp {
                files_to_delete: Some(files),
            } if !files.is_empty() => Some(parsed),
            Self::SkipWaiting => Some(parsed),
            _ => {
                debug!("Ignoring {} message with no files", parsed.action());
                None
            }
        }
    }

    /// Wire name of the action
    pub fn action(&self) -> &'static str {
        match self {
            Self::SkipWaiting => "skipWaiting",
            Self::CacheApp { .. } => "cache-app",
            Self::UncacheApp { .. } => "uncache-app",
        }
    }
}

#[cfg(test)]
impl ControlMessage {
    /// Build a `cache-app` message
    pub fn cache_app(files: Vec<String>) -> Self {
        Self::CacheApp { files: Some(files) }
    }

    /// Build an `uncache-app` message
    pub fn uncache_app(files: Vec<String>) -> Self {
        Self::UncacheApp {
            files_to_delete: Some(files),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_skip_waiting() {
        let msg = ControlMessage::parse(&json!({"action": "skipWaiting"}));
        assert_eq!(msg, Some(ControlMessage::SkipWaiting));
    }

    #[test]
    fn parses_cache_app() {
        let msg = ControlMessage::parse(&json!({
            "action": "cache-app",
            "files": ["/apps/clock/index.html", "/apps/clock/icon.png"]
        }))
        .unwrap();
        assert_eq!(
            msg,
            ControlMessage::cache_app(vec![
                "/apps/clock/index.html".to_string(),
                "/apps/clock/icon.png".to_string()
            ])
        );
        assert_eq!(msg.action(), "cache-app");
    }

    #[test]
    fn parses_uncache_app_wire_name() {
        let msg = ControlMessage::parse(&json!({
            "action": "uncache-app",
            "filesToDelete": ["/apps/clock/index.html"]
        }));
        assert!(matches!(msg, Some(ControlMessage::UncacheApp { .. })));
    }

    #[test]
    fn ignores_malformed_messages() {
        for raw in [
            json!(null),
            json!("skipWaiting"),
            json!({}),
            json!({"action": "reboot"}),
            json!({"action": "cache-app"}),
            json!({"action": "cache-app", "files": null}),
            json!({"action": "cache-app", "files": []}),
            json!({"action": "cache-app", "files": [1, 2]}),
            json!({"action": "uncache-app", "files": ["/a"]}),
        ] {
            assert_eq!(ControlMessage::parse(&raw), None, "{}", raw);
        }
    }

    #[test]
    fn serializes_with_action_tag() {
        let value = serde_json::to_value(ControlMessage::uncache_app(vec!["/a".into()])).unwrap();
        assert_eq!(value["action"], "uncache-app");
        assert_eq!(value["filesToDelete"][0], "/a");
    }
}

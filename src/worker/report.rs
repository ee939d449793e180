//! Outcomes of lifecycle steps and control messages

use serde::Serialize;

/// Result of a successful install
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Cache that was populated
    pub cache: String,
    /// Core assets stored
    pub assets: usize,
}

/// Result of an activation sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// Stale caches removed
    pub deleted: Vec<String>,
    /// Stale caches that could not be removed, with the reason
    pub failed: Vec<(String, String)>,
    /// Clients that changed controller
    pub claimed: usize,
}

/// Result of a best-effort `cache-app`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheAppReport {
    /// Files now cached
    pub cached: Vec<String>,
    /// Files that could not be cached, with the reason
    pub failed: Vec<(String, String)>,
}

/// Outcome of removing one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "kebab-case")]
pub enum UncacheStatus {
    Removed,
    NotFound,
    Failed(String),
}

/// Result of a best-effort `uncache-app`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UncacheReport {
    /// Per-file outcome, in request order
    pub results: Vec<(String, UncacheStatus)>,
}

impl UncacheReport {
    /// Number of files actually removed
    pub fn removed(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, s)| *s == UncacheStatus::Removed)
            .count()
    }
}

/// What a control message did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum MessageOutcome {
    /// Malformed or unknown; nothing happened
    Ignored,
    /// The worker asked to skip waiting
    SkipWaiting,
    /// Files were added to the cache
    CacheApp(CacheAppReport),
    /// Files were removed from the cache
    UncacheApp(UncacheReport),
    /// The cache could not be opened at all
    Failed { action: String, reason: String },
}

impl MessageOutcome {
    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::SkipWaiting => "skip-waiting",
            Self::CacheApp(_) => "cache-app",
            Self::UncacheApp(_) => "uncache-app",
            Self::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncache_counts_removed() {
        let report = UncacheReport {
            results: vec![
                ("/a".into(), UncacheStatus::Removed),
                ("/b".into(), UncacheStatus::NotFound),
                ("/c".into(), UncacheStatus::Failed("io".into())),
            ],
        };
        assert_eq!(report.removed(), 1);
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(MessageOutcome::Ignored).unwrap();
        assert_eq!(json["outcome"], "ignored");

        let json = serde_json::to_value(UncacheStatus::Failed("denied".into())).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "denied");
    }
}

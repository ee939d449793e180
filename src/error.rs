//! Error types for streams-cache
//!
//! All modules use `StreamsResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for streams-cache operations
pub type StreamsResult<T> = Result<T, StreamsError>;

/// All errors that can occur in streams-cache
#[derive(Error, Debug)]
pub enum StreamsError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigValue { key: String, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Request errors
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request method {method} is not supported by the cache")]
    UnsupportedMethod { method: String },

    // Network errors
    #[error("Network request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Bad response status {status} for {url}")]
    BadStatus { url: String, status: u16 },

    // Lifecycle errors
    #[error("Install of {cache} failed: {reason}")]
    InstallFailed { cache: String, reason: String },

    #[error("No {0} worker")]
    NoWorker(&'static str),

    #[error("Client not found: {0}")]
    ClientNotFound(String),

    // Storage errors
    #[error("Cache not found: {0}")]
    CacheNotFound(String),

    #[error("Corrupt cache data at {path}: {reason}")]
    StorageCorrupt { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl StreamsError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error came from the network rather than local state
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::BadStatus { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NoWorker("active") => Some("Run: streams-cache install"),
            Self::NoWorker("waiting") => Some("Install a new version first: streams-cache install"),
            Self::InstallFailed { .. } => {
                Some("Check that network.origin serves every worker.core_assets entry")
            }
            Self::ConfigInvalid { .. } => Some("Run: streams-cache config init --force"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StreamsError::BadStatus {
            url: "http://localhost/index.html".to_string(),
            status: 404,
        };
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn error_hint() {
        let err = StreamsError::NoWorker("active");
        assert_eq!(err.hint(), Some("Run: streams-cache install"));
        assert_eq!(StreamsError::Internal("x".into()).hint(), None);
    }

    #[test]
    fn error_is_network() {
        assert!(StreamsError::network("http://x", "refused").is_network());
        assert!(!StreamsError::CacheNotFound("c".into()).is_network());
    }
}

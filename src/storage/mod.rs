//! Named cache storage
//!
//! Process-wide store of named caches, each mapping a request identity
//! (method + URL) to a full response. Storage is an injected capability so
//! the proxy can run against disk or memory:
//!
//! | Backend | Persistence | Use |
//! |---------|-------------|-----|
//! | `DiskStorage` | state directory | CLI, long-running hosts |
//! | `MemoryStorage` | process lifetime | tests, ephemeral hosts |
//!
//! # Invariants
//!
//! - Entries are immutable in place; `put` overwrites the whole entry
//! - Only `GET` requests are stored; matching any other method misses
//! - `put_all` commits every entry or none; a repeated key keeps its last response

mod disk;
mod memory;
pub mod name;

pub use disk::DiskStorage;
pub use memory::{MemoryStorage, StorageStats};
pub use name::CacheName;

use crate::config::{Config, StatePaths, StorageBackend};
use crate::error::{StreamsError, StreamsResult};
use crate::http::{Request, RequestKey, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// Store of named caches
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a cache, creating it if absent
    async fn open(&self, name: &str) -> StreamsResult<Arc<dyn NamedCache>>;

    /// Whether a cache exists
    async fn has(&self, name: &str) -> StreamsResult<bool>;

    /// Delete a whole cache. Returns whether it existed.
    async fn delete(&self, name: &str) -> StreamsResult<bool>;

    /// Cache names in creation order
    async fn keys(&self) -> StreamsResult<Vec<String>>;

    /// Look a request up in every cache, in creation order
    async fn match_request(&self, request: &Request) -> StreamsResult<Option<Response>> {
        if !request.key().is_storable() {
            return Ok(None);
        }
        for name in self.keys().await? {
            let cache = self.open(&name).await?;
            if let Some(response) = cache.match_request(request).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}

/// One named cache
#[async_trait]
pub trait NamedCache: Send + Sync {
    /// Cache name
    fn name(&self) -> &str;

    /// Stored response for a request, if any
    async fn match_request(&self, request: &Request) -> StreamsResult<Option<Response>>;

    /// Store (or overwrite) the response for a request
    async fn put(&self, request: &Request, response: Response) -> StreamsResult<()>;

    /// Store a batch of entries; either all are committed or none
    async fn put_all(&self, entries: Vec<(Request, Response)>) -> StreamsResult<()>;

    /// Remove the entry for a request. Returns whether it existed.
    async fn delete(&self, request: &Request) -> StreamsResult<bool>;

    /// Keys of all stored entries
    async fn keys(&self) -> StreamsResult<Vec<RequestKey>>;
}

/// Open a cache that must already exist
pub async fn existing(storage: &dyn CacheStorage, name: &str) -> StreamsResult<Arc<dyn NamedCache>> {
    if !storage.has(name).await? {
        return Err(StreamsError::CacheNotFound(name.to_string()));
    }
    storage.open(name).await
}

/// Create the storage backend selected in config
pub fn create_storage(config: &Config, paths: &StatePaths) -> Arc<dyn CacheStorage> {
    match config.storage.backend {
        StorageBackend::Disk => Arc::new(DiskStorage::new(paths.caches_dir())),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(path: &str) -> Request {
        Request::get(Url::parse("http://localhost/").unwrap().join(path).unwrap())
    }

    fn response(body: &'static str) -> Response {
        Response::new(Url::parse("http://localhost/").unwrap(), 200, body)
    }

    #[tokio::test]
    async fn match_searches_caches_in_creation_order() {
        let storage = MemoryStorage::new();
        let old = storage.open("app-v1").await.unwrap();
        let new = storage.open("app-v2").await.unwrap();

        old.put(&request("/a"), response("old")).await.unwrap();
        new.put(&request("/a"), response("new")).await.unwrap();
        new.put(&request("/b"), response("b")).await.unwrap();

        let hit = storage.match_request(&request("/a")).await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"old");
        let hit = storage.match_request(&request("/b")).await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"b");
        assert!(storage.match_request(&request("/c")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn match_never_hits_for_post() {
        let storage = MemoryStorage::new();
        let cache = storage.open("app-v1").await.unwrap();
        cache.put(&request("/a"), response("a")).await.unwrap();

        let mut post = request("/a");
        post.method = "POST".to_string();
        assert!(storage.match_request(&post).await.unwrap().is_none());
    }

    #[test]
    fn backend_follows_config() {
        let paths = StatePaths::at("/tmp/streams-cache-test");
        let mut config = Config::default();
        assert_eq!(create_storage(&config, &paths).backend_name(), "disk");

        config.storage.backend = StorageBackend::Memory;
        assert_eq!(create_storage(&config, &paths).backend_name(), "memory");
    }
}

//! In-memory cache storage

use super::{CacheStorage, NamedCache};
#[cfg(test)]
use crate::error::StreamsError;
use crate::error::StreamsResult;
use crate::http::{Request, RequestKey, Response};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Operation counters shared by every cache of one storage
#[derive(Debug, Default)]
pub struct StorageStats {
    matches: AtomicU64,
    puts: AtomicU64,
    deletes: AtomicU64,
}

impl StorageStats {
    /// Entry lookups performed
    pub fn matches(&self) -> u64 {
        self.matches.load(Ordering::Relaxed)
    }

    /// Entries written
    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Entry deletions attempted
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Total entry-level operations
    pub fn total(&self) -> u64 {
        self.matches() + self.puts() + self.deletes()
    }
}

/// One in-memory cache
pub struct MemoryCache {
    name: String,
    entries: RwLock<BTreeMap<RequestKey, Response>>,
    stats: Arc<StorageStats>,
}

#[async_trait]
impl NamedCache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, request: &Request) -> StreamsResult<Option<Response>> {
        self.stats.matches.fetch_add(1, Ordering::Relaxed);
        let key = request.key();
        if !key.is_storable() {
            return Ok(None);
        }
        Ok(self.entries.read().get(&key).cloned())
    }

    async fn put(&self, request: &Request, response: Response) -> StreamsResult<()> {
        let key = RequestKey::for_storage(request)?;
        self.stats.puts.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert(key, response);
        Ok(())
    }

    async fn put_all(&self, entries: Vec<(Request, Response)>) -> StreamsResult<()> {
        let keyed = entries
            .into_iter()
            .map(|(request, response)| Ok((RequestKey::for_storage(&request)?, response)))
            .collect::<StreamsResult<Vec<_>>>()?;

        self.stats
            .puts
            .fetch_add(keyed.len() as u64, Ordering::Relaxed);
        // later entries for a repeated key win
        let mut map = self.entries.write();
        map.extend(keyed);
        Ok(())
    }

    async fn delete(&self, request: &Request) -> StreamsResult<bool> {
        self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.write().remove(&request.key()).is_some())
    }

    async fn keys(&self) -> StreamsResult<Vec<RequestKey>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

/// Storage that keeps every cache in process memory
#[derive(Default)]
pub struct MemoryStorage {
    caches: Mutex<Vec<Arc<MemoryCache>>>,
    stats: Arc<StorageStats>,
    #[cfg(test)]
    pub(crate) failing_deletes: Mutex<Vec<String>>,
}

impl MemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Operation counters
    pub fn stats(&self) -> &StorageStats {
        &self.stats
    }

    /// Number of entries across all caches
    pub fn entry_count(&self) -> usize {
        self.caches
            .lock()
            .iter()
            .map(|c| c.entries.read().len())
            .sum()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> StreamsResult<Arc<dyn NamedCache>> {
        let mut caches = self.caches.lock();
        if let Some(cache) = caches.iter().find(|c| c.name == name) {
            return Ok(Arc::clone(cache) as Arc<dyn NamedCache>);
        }

        debug!("Creating memory cache {}", name);
        let cache = Arc::new(MemoryCache {
            name: name.to_string(),
            entries: RwLock::new(BTreeMap::new()),
            stats: Arc::clone(&self.stats),
        });
        caches.push(Arc::clone(&cache));
        Ok(cache as Arc<dyn NamedCache>)
    }

    async fn has(&self, name: &str) -> StreamsResult<bool> {
        Ok(self.caches.lock().iter().any(|c| c.name == name))
    }

    async fn delete(&self, name: &str) -> StreamsResult<bool> {
        #[cfg(test)]
        if self.failing_deletes.lock().iter().any(|n| n == name) {
            return Err(StreamsError::Internal(format!("refusing to delete {}", name)));
        }

        let mut caches = self.caches.lock();
        let before = caches.len();
        caches.retain(|c| c.name != name);
        Ok(caches.len() != before)
    }

    async fn keys(&self) -> StreamsResult<Vec<String>> {
        Ok(self.caches.lock().iter().map(|c| c.name.clone()).collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

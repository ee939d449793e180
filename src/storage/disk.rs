//! On-disk cache storage
//!
//! Layout under the storage root:
//!
//! ```text
//! <hex(cache name)>/
//!     cache.json                 name + creation time
//!     entries/<sha256(key)>.json response metadata
//!     entries/<sha256(key)>.body response body
//! ```
//!
//! Every file is written to a uniquely named temporary file and renamed into
//! place, so a reader never sees a half-written entry. The metadata file is
//! renamed last and marks the entry as present. Writers and readers of one
//! cache are serialised by a per-cache lock shared by every handle the
//! storage hands out.

use super::{CacheStorage, NamedCache};
use crate::error::{StreamsError, StreamsResult};
use crate::http::{Request, RequestKey, Response, ResponseKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

const MANIFEST: &str = "cache.json";
const ENTRIES: &str = "entries";

/// Persisted description of one cache
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheManifest {
    name: String,
    created_at: DateTime<Utc>,
}

/// Persisted response metadata; the body lives next to it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryRecord {
    key: RequestKey,
    url: Url,
    status: u16,
    status_text: String,
    headers: Vec<(String, String)>,
    kind: ResponseKind,
    size: u64,
    stored_at: DateTime<Utc>,
}

/// File stem for an entry
fn entry_id(key: &RequestKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.method.as_bytes());
    hasher.update(b" ");
    hasher.update(key.url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Temporary sibling of `path`, unique per write
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}.tmp", name, Uuid::new_v4().simple()))
}

async fn write_atomic(path: &Path, data: &[u8]) -> StreamsResult<()> {
    let tmp = temp_path(path);
    fs::write(&tmp, data)
        .await
        .map_err(|e| StreamsError::io(format!("writing {}", tmp.display()), e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| StreamsError::io(format!("renaming into {}", path.display()), e))
}

async fn remove_if_exists(path: &Path) -> StreamsResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StreamsError::io(format!("removing {}", path.display()), e)),
    }
}

/// One cache directory
pub struct DiskCache {
    name: String,
    entries_dir: PathBuf,
    lock: Arc<tokio::sync::Mutex<()>>,
}

/// Entry files staged under temporary names, not yet visible
struct StagedEntry {
    tmp_body: PathBuf,
    body: PathBuf,
    tmp_meta: PathBuf,
    meta: PathBuf,
}

impl DiskCache {
    fn paths(&self, key: &RequestKey) -> (PathBuf, PathBuf) {
        let id = entry_id(key);
        (
            self.entries_dir.join(format!("{id}.json")),
            self.entries_dir.join(format!("{id}.body")),
        )
    }

    async fn read_record(&self, path: &Path) -> StreamsResult<Option<EntryRecord>> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StreamsError::io(format!("reading {}", path.display()), e)),
        };
        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| StreamsError::StorageCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    async fn stage(&self, key: RequestKey, response: Response) -> StreamsResult<StagedEntry> {
        let (meta, body) = self.paths(&key);
        let staged = StagedEntry {
            tmp_body: temp_path(&body),
            body,
            tmp_meta: temp_path(&meta),
            meta,
        };

        let record = EntryRecord {
            key,
            url: response.url,
            status: response.status,
            status_text: response.status_text,
            headers: response.headers,
            kind: response.kind,
            size: response.body.len() as u64,
            stored_at: Utc::now(),
        };

        fs::write(&staged.tmp_body, &response.body)
            .await
            .map_err(|e| StreamsError::io(format!("writing {}", staged.tmp_body.display()), e))?;
        fs::write(&staged.tmp_meta, serde_json::to_vec_pretty(&record)?)
            .await
            .map_err(|e| StreamsError::io(format!("writing {}", staged.tmp_meta.display()), e))?;

        Ok(staged)
    }

    async fn commit(staged: &StagedEntry) -> StreamsResult<()> {
        fs::rename(&staged.tmp_body, &staged.body)
            .await
            .map_err(|e| StreamsError::io(format!("renaming into {}", staged.body.display()), e))?;
        fs::rename(&staged.tmp_meta, &staged.meta)
            .await
            .map_err(|e| StreamsError::io(format!("renaming into {}", staged.meta.display()), e))
    }

    async fn discard(staged: &[StagedEntry]) {
        for entry in staged {
            for path in [&entry.tmp_body, &entry.tmp_meta] {
                if let Err(e) = remove_if_exists(path).await {
                    warn!("Failed to clean up staged file: {}", e);
                }
            }
        }
    }

    /// Remove entries of a batch that were already renamed into place
    async fn roll_back(committed: &[StagedEntry]) {
        for entry in committed {
            for path in [&entry.meta, &entry.body] {
                if let Err(e) = remove_if_exists(path).await {
                    warn!("Failed to roll back cache entry: {}", e);
                }
            }
        }
    }

    async fn stage_all(&self, keyed: Vec<(RequestKey, Response)>) -> StreamsResult<Vec<StagedEntry>> {
        let mut staged = Vec::with_capacity(keyed.len());
        for (key, response) in keyed {
            match self.stage(key, response).await {
                Ok(entry) => staged.push(entry),
                Err(e) => {
                    Self::discard(&staged).await;
                    return Err(e);
                }
            }
        }
        Ok(staged)
    }
}

/// Key every entry and keep only the last response for a repeated key
fn dedupe(entries: Vec<(Request, Response)>) -> StreamsResult<Vec<(RequestKey, Response)>> {
    let mut keyed: Vec<(RequestKey, Response)> = Vec::with_capacity(entries.len());
    for (request, response) in entries {
        let key = RequestKey::for_storage(&request)?;
        match keyed.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = response,
            None => keyed.push((key, response)),
        }
    }
    Ok(keyed)
}

#[async_trait]
impl NamedCache for DiskCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, request: &Request) -> StreamsResult<Option<Response>> {
        let key = request.key();
        if !key.is_storable() {
            return Ok(None);
        }

        let _guard = self.lock.lock().await;
        let (meta_path, body_path) = self.paths(&key);
        let Some(record) = self.read_record(&meta_path).await? else {
            return Ok(None);
        };

        let body = fs::read(&body_path)
            .await
            .map_err(|e| StreamsError::StorageCorrupt {
                path: body_path.clone(),
                reason: e.to_string(),
            })?;

        Ok(Some(Response {
            url: record.url,
            status: record.status,
            status_text: record.status_text,
            headers: record.headers,
            body: body.into(),
            kind: record.kind,
        }))
    }

    async fn put(&self, request: &Request, response: Response) -> StreamsResult<()> {
        self.put_all(vec![(request.clone(), response)]).await
    }

    async fn put_all(&self, entries: Vec<(Request, Response)>) -> StreamsResult<()> {
        let keyed = dedupe(entries)?;

        let _guard = self.lock.lock().await;
        let staged = self.stage_all(keyed).await?;

        for (i, entry) in staged.iter().enumerate() {
            if let Err(e) = Self::commit(entry).await {
                warn!("Commit into {} failed, rolling back {} entries", self.name, i);
                Self::roll_back(&staged[..=i]).await;
                Self::discard(&staged[i..]).await;
                return Err(e);
            }
        }

        debug!("Stored {} entries in {}", staged.len(), self.name);
        Ok(())
    }

    async fn delete(&self, request: &Request) -> StreamsResult<bool> {
        let _guard = self.lock.lock().await;
        let (meta, body) = self.paths(&request.key());
        let existed = remove_if_exists(&meta).await?;
        remove_if_exists(&body).await?;
        Ok(existed)
    }

    async fn keys(&self) -> StreamsResult<Vec<RequestKey>> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.entries_dir)
            .await
            .map_err(|e| StreamsError::io(format!("reading {}", self.entries_dir.display()), e))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StreamsError::io("reading cache entry", e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match self.read_record(&path).await {
                    Ok(Some(record)) => keys.push(record.key),
                    Ok(None) => {}
                    Err(e) => warn!("Skipping unreadable entry in {}: {}", self.name, e),
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Storage that keeps each cache in its own directory
pub struct DiskStorage {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DiskStorage {
    /// Create a storage rooted at `root`; nothing is touched until first use
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks.lock().entry(name.to_string()).or_default())
    }

    fn cache_dir(&self, name: &str) -> PathBuf {
        self.root.join(hex::encode(name.as_bytes()))
    }

    async fn read_manifest(dir: &Path) -> StreamsResult<Option<CacheManifest>> {
        let path = dir.join(MANIFEST);
        match fs::read(&path).await {
            Ok(content) => serde_json::from_slice(&content).map(Some).map_err(|e| {
                StreamsError::StorageCorrupt {
                    path,
                    reason: e.to_string(),
                }
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StreamsError::io(format!("reading {}", path.display()), e)),
        }
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> StreamsResult<Arc<dyn NamedCache>> {
        let dir = self.cache_dir(name);
        let entries_dir = dir.join(ENTRIES);

        if Self::read_manifest(&dir).await?.is_none() {
            debug!("Creating disk cache {} at {}", name, dir.display());
            fs::create_dir_all(&entries_dir).await.map_err(|e| {
                StreamsError::io(format!("creating directory {}", entries_dir.display()), e)
            })?;
            let manifest = CacheManifest {
                name: name.to_string(),
                created_at: Utc::now(),
            };
            write_atomic(&dir.join(MANIFEST), &serde_json::to_vec_pretty(&manifest)?).await?;
        }

        Ok(Arc::new(DiskCache {
            name: name.to_string(),
            entries_dir,
            lock: self.lock_for(name),
        }))
    }

    async fn has(&self, name: &str) -> StreamsResult<bool> {
        Ok(Self::read_manifest(&self.cache_dir(name)).await?.is_some())
    }

    async fn delete(&self, name: &str) -> StreamsResult<bool> {
        let dir = self.cache_dir(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StreamsError::io(format!("removing cache {}", name), e)),
        }
    }

    async fn keys(&self) -> StreamsResult<Vec<String>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(StreamsError::io(
                    format!("reading {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut manifests = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StreamsError::io("reading cache directory", e))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match Self::read_manifest(&path).await {
                Ok(Some(manifest)) => manifests.push(manifest),
                Ok(None) => debug!("Skipping {} (no manifest)", path.display()),
                Err(e) => warn!("Skipping unreadable cache: {}", e),
            }
        }

        manifests.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(manifests.into_iter().map(|m| m.name).collect())
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}

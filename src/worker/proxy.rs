//! The cache proxy: one worker version and its event handlers
//!
//! A `CacheProxy` owns exactly one named cache and handles four kinds of
//! event:
//!
//! | Event | Handler | Completion |
//! |-------|---------|------------|
//! | `Install` | all-or-nothing fetch of the core assets | every asset stored, or nothing |
//! | `Activate` | purge caches with other names, claim clients | every deletion settled |
//! | `Message` | `skipWaiting`, `cache-app`, `uncache-app` | never fails |
//! | `Fetch` | bypass or cache-first | response or network error |
//!
//! The future returned by each handler is the completion contract for that
//! phase: the host must await it before treating the phase as done.

use crate::error::{StreamsError, StreamsResult};
use crate::fetch::{fetch_each, Fetcher};
use crate::http::{Request, Response};
use crate::storage::CacheStorage;
use crate::worker::clients::Clients;
use crate::worker::message::ControlMessage;
use crate::worker::policy::{RoutePolicy, Strategy};
use crate::worker::report::{
    ActivationReport, CacheAppReport, InstallReport, MessageOutcome, UncacheReport, UncacheStatus,
};
use crate::worker::state::WorkerRecord;
use futures_util::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

/// Event delivered to a proxy
#[derive(Debug, Clone)]
pub enum ProxyEvent {
    Install,
    Activate,
    Message(Value),
    Fetch(Request),
}

impl ProxyEvent {
    /// Event kind for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Message(_) => "message",
            Self::Fetch(_) => "fetch",
        }
    }
}

/// What a handler produced
#[derive(Debug)]
pub enum EventResponse {
    Installed(InstallReport),
    Activated(ActivationReport),
    Message(MessageOutcome),
    Fetched(Response),
}

impl EventResponse {
    /// Response kind for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Installed(_) => "installed",
            Self::Activated(_) => "activated",
            Self::Message(_) => "message",
            Self::Fetched(_) => "fetched",
        }
    }
}

/// One worker version bound to its storage and network
pub struct CacheProxy {
    id: Uuid,
    cache_name: String,
    core_assets: Vec<String>,
    policy: RoutePolicy,
    origin: Url,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<Clients>,
}

impl CacheProxy {
    /// Bind a worker record to its capabilities
    pub fn new(
        record: &WorkerRecord,
        origin: Url,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<Clients>,
    ) -> Self {
        Self {
            id: record.id,
            cache_name: record.cache_name.clone(),
            core_assets: record.core_assets.clone(),
            policy: RoutePolicy::new(&record.bypass_hosts),
            origin,
            storage,
            fetcher,
            clients,
        }
    }

    /// Worker id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cache owned by this worker
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Route an event to its handler
    pub async fn dispatch(&self, event: ProxyEvent) -> StreamsResult<EventResponse> {
        debug!("Worker {} handling {} event", self.cache_name, event.kind());
        match event {
            ProxyEvent::Install => self.install().await.map(EventResponse::Installed),
            ProxyEvent::Activate => self.activate().await.map(EventResponse::Activated),
            ProxyEvent::Message(message) => {
                Ok(EventResponse::Message(self.handle_message(&message).await))
            }
            ProxyEvent::Fetch(request) => self.handle_fetch(request).await.map(EventResponse::Fetched),
        }
    }

    /// Populate this worker's cache with every core asset, or with nothing
    pub async fn install(&self) -> StreamsResult<InstallReport> {
        info!(
            "Installing {} ({} core assets)",
            self.cache_name,
            self.core_assets.len()
        );
        let assets = self
            .add_all(&self.core_assets)
            .await
            .inspect_err(|e| error!("Install of {} failed: {}", self.cache_name, e))?;
        info!("Installed {}", self.cache_name);

        Ok(InstallReport {
            cache: self.cache_name.clone(),
            assets,
        })
    }

    /// Delete every cache not owned by this worker, then claim all clients
    pub async fn activate(&self) -> StreamsResult<ActivationReport> {
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| *name != self.cache_name)
            .collect();

        let results = join_all(stale.iter().map(|name| async move {
            (name.clone(), self.storage.delete(name).await)
        }))
        .await;

        let mut report = ActivationReport::default();
        for (name, result) in results {
            match result {
                Ok(_) => {
                    info!("Deleted stale cache {}", name);
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!("Failed to delete stale cache {}: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        report.claimed = self.clients.claim(self.id);
        info!(
            "Activated {} (claimed {} clients)",
            self.cache_name, report.claimed
        );
        Ok(report)
    }

    /// Handle a control message. Never fails; see `MessageOutcome`.
    pub async fn handle_message(&self, message: &Value) -> MessageOutcome {
        let Some(command) = ControlMessage::parse(message) else {
            return MessageOutcome::Ignored;
        };

        match command {
            ControlMessage::SkipWaiting => MessageOutcome::SkipWaiting,
            ControlMessage::CacheApp { files } => {
                match self.add_each(&files.unwrap_or_default()).await {
                    Ok(report) => MessageOutcome::CacheApp(report),
                    Err(e) => self.failed("cache-app", e),
                }
            }
            ControlMessage::UncacheApp { files_to_delete } => {
                match self.remove_each(&files_to_delete.unwrap_or_default()).await {
                    Ok(report) => MessageOutcome::UncacheApp(report),
                    Err(e) => self.failed("uncache-app", e),
                }
            }
        }
    }

    /// Serve an intercepted request
    pub async fn handle_fetch(&self, request: Request) -> StreamsResult<Response> {
        let strategy = self.policy.classify(&request);
        debug!("{} {} -> {}", request.method, request.url, strategy);

        if strategy == Strategy::NetworkOnly {
            return self.fetcher.fetch(&request).await;
        }

        match self.storage.match_request(&request).await {
            Ok(Some(cached)) => {
                debug!("Cache hit for {}", request.url);
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => warn!("Cache lookup for {} failed, using network: {}", request.url, e),
        }

        let response = self.fetcher.fetch(&request).await?;
        if response.is_cacheable() && request.key().is_storable() {
            self.store(&request, &response).await;
        } else {
            debug!(
                "Not caching {} (status {})",
                request.url, response.status
            );
        }
        Ok(response)
    }

    async fn store(&self, request: &Request, response: &Response) {
        let result = match self.storage.open(&self.cache_name).await {
            Ok(cache) => cache.put(request, response.clone()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to cache {}: {}", request.url, e);
        }
    }

    fn resolve(&self, raw: &str) -> StreamsResult<Request> {
        Request::resolve(raw, &self.origin)
    }

    /// Strict bulk add: every URL must fetch with a 2xx status before any
    /// entry is committed.
    async fn add_all(&self, urls: &[String]) -> StreamsResult<usize> {
        let install_failed = |reason: String| StreamsError::InstallFailed {
            cache: self.cache_name.clone(),
            reason,
        };

        let requests = urls
            .iter()
            .map(|url| self.resolve(url))
            .collect::<StreamsResult<Vec<_>>>()
            .map_err(|e| install_failed(e.to_string()))?;

        let outcomes = fetch_each(&self.fetcher, requests).await;
        let failures: Vec<String> = outcomes.iter().filter_map(|o| o.error()).collect();
        if !failures.is_empty() {
            return Err(install_failed(failures.join("; ")));
        }

        let entries = outcomes
            .into_iter()
            .filter_map(|o| o.result.ok().map(|response| (o.request, response)))
            .collect::<Vec<_>>();
        let count = entries.len();
        let created = !self.storage.has(&self.cache_name).await?;
        let cache = self.storage.open(&self.cache_name).await?;
        if let Err(e) = cache.put_all(entries).await {
            if created {
                if let Err(cleanup) = self.storage.delete(&self.cache_name).await {
                    warn!("Failed to remove cache {}: {}", self.cache_name, cleanup);
                }
            }
            return Err(install_failed(e.to_string()));
        }
        Ok(count)
    }

    /// Best-effort bulk add: each URL stands on its own
    async fn add_each(&self, urls: &[String]) -> StreamsResult<CacheAppReport> {
        let cache = self.storage.open(&self.cache_name).await?;
        let mut report = CacheAppReport::default();

        let mut requests = Vec::with_capacity(urls.len());
        let mut labels = Vec::with_capacity(urls.len());
        for url in urls {
            match self.resolve(url) {
                Ok(request) => {
                    requests.push(request);
                    labels.push(url.clone());
                }
                Err(e) => report.failed.push((url.clone(), e.to_string())),
            }
        }

        for (label, outcome) in labels.into_iter().zip(fetch_each(&self.fetcher, requests).await) {
            let stored = match outcome.result {
                Ok(response) => cache.put(&outcome.request, response).await,
                Err(e) => Err(e),
            };
            match stored {
                Ok(()) => report.cached.push(label),
                Err(e) => report.failed.push((label, e.to_string())),
            }
        }

        if report.failed.is_empty() {
            info!("Cached {} app files", report.cached.len());
        } else {
            warn!(
                "Some app files failed to cache ({} of {}): {}",
                report.failed.len(),
                urls.len(),
                report
                    .failed
                    .iter()
                    .map(|(url, reason)| format!("{} ({})", url, reason))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Ok(report)
    }

    /// Best-effort bulk delete with a per-URL outcome
    async fn remove_each(&self, urls: &[String]) -> StreamsResult<UncacheReport> {
        let cache = self.storage.open(&self.cache_name).await?;

        let results = join_all(urls.iter().map(|url| {
            let cache = Arc::clone(&cache);
            async move {
                let status = match self.resolve(url) {
                    Ok(request) => match cache.delete(&request).await {
                        Ok(true) => UncacheStatus::Removed,
                        Ok(false) => UncacheStatus::NotFound,
                        Err(e) => UncacheStatus::Failed(e.to_string()),
                    },
                    Err(e) => UncacheStatus::Failed(e.to_string()),
                };
                (url.clone(), status)
            }
        }))
        .await;

        let report = UncacheReport { results };
        for (url, status) in &report.results {
            match status {
                UncacheStatus::Removed => debug!("Uncached {}", url),
                UncacheStatus::NotFound => debug!("{} was not cached", url),
                UncacheStatus::Failed(reason) => warn!("Failed to uncache {}: {}", url, reason),
            }
        }
        info!("Uncached {} of {} app files", report.removed(), urls.len());
        Ok(report)
    }

    fn failed(&self, action: &str, error: StreamsError) -> MessageOutcome {
        warn!("{} on {} failed: {}", action, self.cache_name, error);
        MessageOutcome::Failed {
            action: action.to_string(),
            reason: error.to_string(),
        }
    }
}

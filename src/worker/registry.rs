//! Lifecycle host for worker versions
//!
//! The registry plays the role a browser plays for a service worker: it
//! installs new versions, decides when a waiting version may activate,
//! routes control messages and intercepted requests, and tracks attached
//! clients. Its state is persisted as `registration.json`.

use crate::error::{StreamsError, StreamsResult};
use crate::events::EventLog;
use crate::fetch::Fetcher;
use crate::http::{Request, Response};
use crate::storage::CacheStorage;
use crate::worker::clients::{ClientRecord, Clients};
use crate::worker::proxy::{CacheProxy, EventResponse, ProxyEvent};
use crate::worker::report::{ActivationReport, MessageOutcome};
use crate::worker::state::{Registration, WorkerRecord, WorkerState};
use chrono::Utc;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Which worker a message is posted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTarget {
    Active,
    Waiting,
}

/// Worker registry backed by a registration file
pub struct Registry {
    registration: Registration,
    path: Option<PathBuf>,
    clients: Arc<Clients>,
    origin: Url,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    events: EventLog,
}

impl Registry {
    /// Create a registry over an in-memory registration
    pub fn new(
        registration: Registration,
        origin: Url,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        events: EventLog,
    ) -> Self {
        let clients = Arc::new(Clients::from_records(registration.clients.clone()));
        Self {
            registration,
            path: None,
            clients,
            origin,
            storage,
            fetcher,
            events,
        }
    }

    /// Load the registration at `path`; `save` writes back to it
    pub async fn load(
        path: PathBuf,
        origin: Url,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        events: EventLog,
    ) -> StreamsResult<Self> {
        let registration = Registration::load(&path).await?;
        let mut registry = Self::new(registration, origin, storage, fetcher, events);
        registry.path = Some(path);
        Ok(registry)
    }

    /// Persist the registration, if it was loaded from a file
    pub async fn save(&mut self) -> StreamsResult<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let mut registration = self.registration();
        registration.save(&path).await?;
        self.registration.updated_at = registration.updated_at;
        Ok(())
    }

    /// Snapshot of the registration including current clients
    pub fn registration(&self) -> Registration {
        let mut registration = self.registration.clone();
        registration.clients = self.clients.snapshot();
        registration
    }

    /// Worker serving requests
    pub fn active(&self) -> Option<&WorkerRecord> {
        self.registration.active.as_ref()
    }

    /// Installed worker waiting to take over
    pub fn waiting(&self) -> Option<&WorkerRecord> {
        self.registration.waiting.as_ref()
    }

    /// Attached clients
    pub fn clients(&self) -> &Arc<Clients> {
        &self.clients
    }

    /// Shared cache storage
    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    fn proxy(&self, record: &WorkerRecord) -> CacheProxy {
        CacheProxy::new(
            record,
            self.origin.clone(),
            Arc::clone(&self.storage),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.clients),
        )
    }

    /// Install a worker version and activate it when nothing holds it back.
    ///
    /// Returns the state the candidate ended in. A failed install leaves the
    /// current registration untouched and returns the install error.
    pub async fn register(&mut self, mut candidate: WorkerRecord) -> StreamsResult<WorkerState> {
        if let Some(active) = self.active() {
            if active.cache_name == candidate.cache_name {
                info!("{} is already active", candidate.cache_name);
                return Ok(WorkerState::Activated);
            }
        }
        if let Some(waiting) = self.waiting() {
            if waiting.cache_name == candidate.cache_name {
                info!("{} is already installed and waiting", candidate.cache_name);
                return Ok(WorkerState::Installed);
            }
        }

        candidate.state = WorkerState::Installing;
        let result = self.proxy(&candidate).dispatch(ProxyEvent::Install).await;
        let report = match result {
            Ok(EventResponse::Installed(report)) => report,
            Ok(other) => return Err(unexpected("install", &other)),
            Err(e) => {
                candidate.state = WorkerState::Redundant;
                self.events
                    .record(
                        "worker.install_failed",
                        json!({ "worker": candidate.id, "cache": candidate.cache_name, "error": e.to_string() }),
                    )
                    .await;
                return Err(e);
            }
        };

        candidate.state = WorkerState::Installed;
        candidate.installed_at = Some(Utc::now());
        self.events
            .record(
                "worker.installed",
                json!({ "worker": candidate.id, "cache": report.cache, "assets": report.assets }),
            )
            .await;

        if let Some(previous) = self.registration.waiting.take() {
            info!("Replacing waiting worker {}", previous.cache_name);
            self.retire(previous).await;
        }

        let held = self
            .active()
            .is_some_and(|active| self.clients.controlled_by(active.id) > 0);
        if held {
            info!(
                "{} installed; waiting for clients of the active worker to detach",
                candidate.cache_name
            );
            self.registration.waiting = Some(candidate);
            return Ok(WorkerState::Installed);
        }

        self.activate(candidate).await?;
        Ok(WorkerState::Activated)
    }

    /// Promote the waiting worker now
    pub async fn skip_waiting(&mut self) -> StreamsResult<ActivationReport> {
        let worker = self
            .registration
            .waiting
            .take()
            .ok_or(StreamsError::NoWorker("waiting"))?;
        self.activate(worker).await
    }

    async fn activate(&mut self, mut worker: WorkerRecord) -> StreamsResult<ActivationReport> {
        worker.state = WorkerState::Activating;
        let report = match self.proxy(&worker).dispatch(ProxyEvent::Activate).await {
            Ok(EventResponse::Activated(report)) => report,
            Ok(other) => return Err(unexpected("activate", &other)),
            Err(e) => {
                warn!("Activation of {} failed: {}", worker.cache_name, e);
                worker.state = WorkerState::Installed;
                self.registration.waiting = Some(worker);
                return Err(e);
            }
        };

        worker.state = WorkerState::Activated;
        worker.activated_at = Some(Utc::now());
        self.events
            .record(
                "worker.activated",
                json!({
                    "worker": worker.id,
                    "cache": worker.cache_name,
                    "deleted": report.deleted,
                    "failed": report.failed,
                    "claimed": report.claimed,
                }),
            )
            .await;

        if let Some(previous) = self.registration.active.replace(worker) {
            self.retire(previous).await;
        }
        Ok(report)
    }

    async fn retire(&self, mut worker: WorkerRecord) {
        worker.state = WorkerState::Redundant;
        debug!("Worker {} is redundant", worker.cache_name);
        self.events
            .record(
                "worker.redundant",
                json!({ "worker": worker.id, "cache": worker.cache_name }),
            )
            .await;
    }

    /// Post a control message to the active or waiting worker
    pub async fn post_message(
        &mut self,
        target: MessageTarget,
        message: Value,
    ) -> StreamsResult<MessageOutcome> {
        let record = match target {
            MessageTarget::Active => self.active().ok_or(StreamsError::NoWorker("active"))?,
            MessageTarget::Waiting => self.waiting().ok_or(StreamsError::NoWorker("waiting"))?,
        }
        .clone();

        let outcome = match self
            .proxy(&record)
            .dispatch(ProxyEvent::Message(message))
            .await?
        {
            EventResponse::Message(outcome) => outcome,
            other => return Err(unexpected("message", &other)),
        };

        if outcome != MessageOutcome::Ignored {
            self.events
                .record(
                    "message.handled",
                    json!({ "worker": record.id, "outcome": outcome }),
                )
                .await;
        }

        if outcome == MessageOutcome::SkipWaiting && target == MessageTarget::Waiting {
            self.skip_waiting().await?;
        }
        Ok(outcome)
    }

    /// Fetch through the active worker, or straight from the network
    pub async fn fetch(&self, request: Request) -> StreamsResult<Response> {
        let Some(active) = self.active() else {
            debug!("No active worker; {} goes to the network", request.url);
            return self.fetcher.fetch(&request).await;
        };

        match self.proxy(active).dispatch(ProxyEvent::Fetch(request)).await? {
            EventResponse::Fetched(response) => Ok(response),
            other => Err(unexpected("fetch", &other)),
        }
    }

    /// Attach a client under the active worker
    pub fn attach_client(&self) -> ClientRecord {
        let controller = self.active().map(|w| w.id);
        let client = self.clients.attach(controller);
        info!("Attached client {}", client.id);
        client
    }

    /// Detach a client. When it was the last client of the active worker, a
    /// waiting worker activates and its report is returned.
    pub async fn detach_client(&mut self, id: Uuid) -> StreamsResult<Option<ActivationReport>> {
        if !self.clients.detach(id) {
            return Err(StreamsError::ClientNotFound(id.to_string()));
        }
        info!("Detached client {}", id);

        if self.waiting().is_none() {
            return Ok(None);
        }
        let still_held = self
            .active()
            .is_some_and(|active| self.clients.controlled_by(active.id) > 0);
        if still_held {
            return Ok(None);
        }

        self.skip_waiting().await.map(Some)
    }
}

fn unexpected(event: &str, response: &EventResponse) -> StreamsError {
    StreamsError::Internal(format!(
        "{} handler returned a {} response",
        event,
        response.kind()
    ))
}

//! In-process fetcher with canned responses
//!
//! Used for offline runs and tests. Every call is counted so callers can
//! assert that a cache hit never touched the network.

use super::Fetcher;
use crate::error::{StreamsError, StreamsResult};
use crate::http::{Request, Response, ResponseKind};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Canned behaviour for one URL
#[derive(Debug, Clone)]
pub enum StubRoute {
    /// Answer with a status, headers and body
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
    },
    /// Fail as if the network were unreachable
    Fail(String),
}

impl StubRoute {
    /// A 200 response with the given body
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::Respond {
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: body.into(),
        }
    }

    /// An empty response with the given status
    pub fn status(status: u16) -> Self {
        Self::Respond {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// A network-level failure
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }
}

/// Fetcher answering from a fixed route table
#[derive(Debug, Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, StubRoute>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl StubFetcher {
    /// Create a stub with no routes; every request fails
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route (builder form)
    pub fn route(self, url: &str, route: StubRoute) -> Self {
        self.set_route(url, route);
        self
    }

    /// Add or replace a route
    pub fn set_route(&self, url: &str, route: StubRoute) {
        self.routes.lock().insert(url.to_string(), route);
    }

    /// Number of requests issued so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of requests issued for one URL
    pub fn calls_for(&self, url: &str) -> usize {
        self.seen.lock().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> StreamsResult<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.url.to_string();
        self.seen.lock().push(url.clone());

        let route = self.routes.lock().get(&url).cloned();
        debug!("stub {} {} -> {:?}", request.method, url, route.is_some());

        match route {
            Some(StubRoute::Respond {
                status,
                headers,
                body,
            }) => Ok(Response {
                url: request.url.clone(),
                status,
                status_text: String::new(),
                headers,
                body,
                kind: ResponseKind::Basic,
            }),
            Some(StubRoute::Fail(reason)) => Err(StreamsError::network(url, reason)),
            None => Err(StreamsError::network(url, "no stub route")),
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn counts_calls_per_url() {
        let stub = StubFetcher::new().route("http://localhost/a", StubRoute::ok("hello"));
        let req = Request::get(Url::parse("http://localhost/a").unwrap());

        let resp = stub.fetch(&req).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(&resp.body[..], b"hello");

        let _ = stub.fetch(&req).await;
        assert_eq!(stub.calls(), 2);
        assert_eq!(stub.calls_for("http://localhost/a"), 2);
        assert_eq!(stub.calls_for("http://localhost/b"), 0);
    }

    #[tokio::test]
    async fn unknown_url_is_network_error() {
        let stub = StubFetcher::new();
        let req = Request::get(Url::parse("http://localhost/missing").unwrap());
        let err = stub.fetch(&req).await.unwrap_err();
        assert!(err.is_network());
    }
}

//! Network access for the proxy
//!
//! The network is an injected capability so the proxy can run against a
//! real HTTP client or an in-process stub:
//! - `HttpFetcher`: blocking `ureq` agent driven from the tokio blocking pool
//! - `StubFetcher`: canned responses with call counting

mod http;
mod stub;

pub use http::HttpFetcher;
pub use stub::{StubFetcher, StubRoute};

use crate::error::{StreamsError, StreamsResult};
use crate::http::{Request, Response};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;

/// Abstract network interface
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue a request. HTTP error statuses are responses, not errors;
    /// `Err` means no response was received at all.
    async fn fetch(&self, request: &Request) -> StreamsResult<Response>;

    /// Human-readable backend name for display
    fn name(&self) -> &'static str;
}

/// Result of one fetch inside a bulk operation
#[derive(Debug)]
pub struct FetchOutcome {
    /// The request that was issued
    pub request: Request,
    /// Response, or the reason none was usable
    pub result: StreamsResult<Response>,
}

impl FetchOutcome {
    /// Whether the fetch produced a 2xx response
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Failure reason, if any
    pub fn error(&self) -> Option<String> {
        self.result.as_ref().err().map(|e| e.to_string())
    }
}

/// Fetch every request concurrently and keep each outcome separately.
///
/// Responses rejected by `require_ok` become `BadStatus` failures so that
/// callers only ever store complete, successful responses from a bulk fetch.
pub async fn fetch_each(fetcher: &Arc<dyn Fetcher>, requests: Vec<Request>) -> Vec<FetchOutcome> {
    let futures = requests.into_iter().map(|request| {
        let fetcher = Arc::clone(fetcher);
        async move {
            let result = fetcher.fetch(&request).await.and_then(require_ok);
            FetchOutcome { request, result }
        }
    });
    join_all(futures).await
}

/// HTTP 206 Partial Content; ranges are never stored
const PARTIAL_CONTENT: u16 = 206;

/// Reject responses outside the 2xx range, and partial content
pub fn require_ok(response: Response) -> StreamsResult<Response> {
    if response.ok() && response.status != PARTIAL_CONTENT {
        Ok(response)
    } else {
        Err(StreamsError::BadStatus {
            url: response.url.to_string(),
            status: response.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn fetch_each_keeps_per_request_outcomes() {
        let stub = StubFetcher::new()
            .route("http://localhost/a", StubRoute::ok("a"))
            .route("http://localhost/b", StubRoute::status(404))
            .route("http://localhost/c", StubRoute::fail("connection reset"))
            .route("http://localhost/d", StubRoute::status(206))
            .route("http://localhost/e", StubRoute::status(204));
        let fetcher: Arc<dyn Fetcher> = Arc::new(stub);

        let requests = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|p| Request::get(Url::parse(&format!("http://localhost/{p}")).unwrap()))
            .collect();
        let outcomes = fetch_each(&fetcher, requests).await;

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes[0].is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(StreamsError::BadStatus { status: 404, .. })
        ));
        assert!(outcomes[2].error().unwrap().contains("connection reset"));
        assert!(matches!(
            outcomes[3].result,
            Err(StreamsError::BadStatus { status: 206, .. })
        ));
        assert!(outcomes[4].is_ok());
    }
}

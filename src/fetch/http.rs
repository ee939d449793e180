//! HTTP fetcher backed by a blocking `ureq` agent

use super::Fetcher;
use crate::error::{StreamsError, StreamsResult};
use crate::http::{Request, RequestMode, Response, ResponseKind};
use async_trait::async_trait;
use tracing::{debug, trace};
use url::Url;

/// Largest response body read into memory
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Fetcher that talks to the real network
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    origin: Url,
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher for an application served from `origin`.
    ///
    /// HTTP error statuses are returned as responses; only transport
    /// failures become errors.
    pub fn new(origin: Url, user_agent: impl Into<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            origin,
            user_agent: user_agent.into(),
        }
    }

    fn classify(&self, request: &Request, response: Response) -> Response {
        if request.url.origin() == self.origin.origin() {
            return response;
        }
        match request.mode {
            RequestMode::NoCors => response.into_opaque(),
            RequestMode::Cors => Response {
                kind: ResponseKind::Cors,
                ..response
            },
        }
    }
}

fn execute(agent: &ureq::Agent, request: &Request, user_agent: &str) -> StreamsResult<Response> {
    let url = request.url.as_str();

    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(url)
        .header("User-Agent", user_agent);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let result = if request.body.is_empty() {
        let req = builder
            .body(())
            .map_err(|e| StreamsError::invalid_url(url, e))?;
        agent.run(req)
    } else {
        let req = builder
            .body(request.body.to_vec())
            .map_err(|e| StreamsError::invalid_url(url, e))?;
        agent.run(req)
    };

    let mut response = result.map_err(|e| StreamsError::network(url, e.to_string()))?;

    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_vec()
        .map_err(|e| StreamsError::network(url, format!("reading body: {}", e)))?;

    trace!("{} {} -> {} ({} bytes)", request.method, url, status, body.len());

    Ok(Response {
        url: request.url.clone(),
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body: body.into(),
        kind: ResponseKind::Basic,
    })
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> StreamsResult<Response> {
        debug!("Fetching {} {}", request.method, request.url);

        let agent = self.agent.clone();
        let owned = request.clone();
        let user_agent = self.user_agent.clone();

        let response = tokio::task::spawn_blocking(move || execute(&agent, &owned, &user_agent))
            .await
            .map_err(|e| StreamsError::Internal(format!("fetch task failed: {}", e)))??;

        Ok(self.classify(request, response))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

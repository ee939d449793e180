//! Request and response values passed between the proxy, the cache and the network
//!
//! These are plain owned values; bodies are `Bytes` so duplicating a
//! response for the cache and the caller is a reference-count bump.

use crate::error::{StreamsError, StreamsResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// How a request treats cross-origin responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Cross-origin responses are readable (CORS)
    #[default]
    Cors,
    /// Cross-origin responses come back opaque
    NoCors,
}

/// An intercepted request
#[derive(Debug, Clone)]
pub struct Request {
    /// Uppercase HTTP method
    pub method: String,
    /// Absolute URL
    pub url: Url,
    /// Request headers (name, value)
    pub headers: Vec<(String, String)>,
    /// Request body, empty for GET
    pub body: Bytes,
    /// CORS mode
    pub mode: RequestMode,
}

impl Request {
    /// Create a GET request
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Create a request with the given method
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            headers: Vec::new(),
            body: Bytes::new(),
            mode: RequestMode::default(),
        }
    }

    /// Parse `raw` as an absolute URL, or resolve it against `base`
    pub fn resolve(raw: &str, base: &Url) -> StreamsResult<Self> {
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                base.join(raw).map_err(|e| StreamsError::invalid_url(raw, e))?
            }
            Err(e) => return Err(StreamsError::invalid_url(raw, e)),
        };
        Ok(Self::get(url))
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the CORS mode
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Host of the request URL, if any
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Cache identity of this request
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Identity of a cache entry: method and URL, header variance ignored
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    /// Uppercase HTTP method
    pub method: String,
    /// Absolute URL without fragment
    pub url: String,
}

impl RequestKey {
    /// Build a key; the URL fragment never takes part in matching
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
        }
    }

    /// Whether entries under this key may be stored
    pub fn is_storable(&self) -> bool {
        self.method == "GET"
    }

    /// Key of a request that is about to be stored
    pub fn for_storage(request: &Request) -> StreamsResult<Self> {
        let key = request.key();
        if !key.is_storable() {
            return Err(StreamsError::UnsupportedMethod { method: key.method });
        }
        Ok(key)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Visibility class of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response
    Basic,
    /// Cross-origin response readable through CORS
    Cors,
    /// Cross-origin `no-cors` response; status and headers hidden
    Opaque,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Cors => write!(f, "cors"),
            Self::Opaque => write!(f, "opaque"),
        }
    }
}

/// A full response object
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects
    pub url: Url,
    /// Status code (0 for opaque responses)
    pub status: u16,
    /// Reason phrase
    pub status_text: String,
    /// Response headers (name, value)
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
    /// Visibility class
    pub kind: ResponseKind,
}

impl Response {
    /// Build a basic response
    pub fn new(url: Url, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url,
            status,
            status_text: String::new(),
            headers: Vec::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    /// Hide status and headers, keeping the body for replay
    pub fn into_opaque(mut self) -> Self {
        self.status = 0;
        self.status_text.clear();
        self.headers.clear();
        self.kind = ResponseKind::Opaque;
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header value matching `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Status in the 200-299 range
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether a runtime cache miss may store this response.
    ///
    /// Only a clean 200 qualifies. Opaque responses are stored too since
    /// their real status cannot be observed.
    pub fn is_cacheable(&self) -> bool {
        self.kind == ResponseKind::Opaque || self.status == 200
    }
}

//! Per-request strategy selection
//!
//! Live external APIs are routed straight to the network; everything else
//! is served cache-first.

use crate::http::Request;
use std::fmt;

/// How an intercepted request is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Pass through to the network; the cache is never read or written
    NetworkOnly,
    /// Serve from cache, fill from the network on a miss
    CacheFirst,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkOnly => write!(f, "network-only"),
            Self::CacheFirst => write!(f, "cache-first"),
        }
    }
}

/// Routing policy keyed on the request host
#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    bypass_hosts: Vec<String>,
}

impl RoutePolicy {
    /// Create a policy that bypasses the given hosts
    pub fn new<I, S>(bypass_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            bypass_hosts: bypass_hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Hosts exempt from caching
    pub fn bypass_hosts(&self) -> &[String] {
        &self.bypass_hosts
    }

    /// Pick the strategy for a request.
    ///
    /// Hosts are compared exactly (case-insensitive); subdomains of a
    /// bypass host are still cached.
    pub fn classify(&self, request: &Request) -> Strategy {
        match request.host() {
            Some(host) if self.bypass_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) => {
                Strategy::NetworkOnly
            }
            _ => Strategy::CacheFirst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    fn policy() -> RoutePolicy {
        RoutePolicy::new(["api.open-meteo.com", " Nominatim.OpenStreetMap.org "])
    }

    #[test]
    fn bypass_hosts_are_network_only() {
        let policy = policy();
        assert_eq!(
            policy.classify(&request("https://api.open-meteo.com/v1/forecast?lat=1")),
            Strategy::NetworkOnly
        );
        assert_eq!(
            policy.classify(&request("https://nominatim.openstreetmap.org/search")),
            Strategy::NetworkOnly
        );
    }

    #[test]
    fn everything_else_is_cache_first() {
        let policy = policy();
        assert_eq!(
            policy.classify(&request("http://localhost:8080/index.html")),
            Strategy::CacheFirst
        );
        assert_eq!(
            policy.classify(&request("https://eu.api.open-meteo.com/v1")),
            Strategy::CacheFirst
        );
    }

    #[test]
    fn blank_hosts_are_dropped() {
        let policy = RoutePolicy::new(["", "  "]);
        assert!(policy.bypass_hosts().is_empty());
    }
}

//! Versioned cache names
//!
//! Cache names follow `{prefix}-v{version}`. Versions are often shortened
//! (`13.2`), so parsing pads them to a full semantic version.

use semver::Version;
use std::cmp::Ordering;
use std::fmt;

/// A parsed `{prefix}-v{version}` cache name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheName {
    /// Application prefix (e.g. `streams-cache`)
    pub prefix: String,
    /// Version as written in the name
    pub raw_version: String,
    /// Normalised semantic version
    pub version: Version,
}

impl CacheName {
    /// Parse a cache name. Returns `None` when the name has no version suffix.
    pub fn parse(name: &str) -> Option<Self> {
        let idx = name.rfind("-v")?;
        let prefix = &name[..idx];
        let raw_version = &name[idx + 2..];
        if prefix.is_empty() {
            return None;
        }

        Some(Self {
            prefix: prefix.to_string(),
            raw_version: raw_version.to_string(),
            version: parse_lenient(raw_version)?,
        })
    }

    /// Whether `other` belongs to the same application
    pub fn same_family(&self, other: &CacheName) -> bool {
        self.prefix == other.prefix
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-v{}", self.prefix, self.raw_version)
    }
}

/// Parse `13`, `13.2` or `13.2.1` (with optional pre-release) as semver
pub fn parse_lenient(raw: &str) -> Option<Version> {
    if let Ok(v) = Version::parse(raw) {
        return Some(v);
    }

    let (core, rest) = match raw.find(['-', '+']) {
        Some(i) => raw.split_at(i),
        None => (raw, ""),
    };
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{rest}"),
        2 => format!("{core}.0{rest}"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

/// Order cache names by version within a family, unparseable names last
pub fn compare_names(a: &str, b: &str) -> Ordering {
    match (CacheName::parse(a), CacheName::parse(b)) {
        (Some(x), Some(y)) => x
            .prefix
            .cmp(&y.prefix)
            .then_with(|| x.version.cmp(&y.version)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_version() {
        let name = CacheName::parse("streams-cache-v13.2").unwrap();
        assert_eq!(name.prefix, "streams-cache");
        assert_eq!(name.raw_version, "13.2");
        assert_eq!(name.version, Version::new(13, 2, 0));
        assert_eq!(name.to_string(), "streams-cache-v13.2");
    }

    #[test]
    fn parses_full_and_prerelease() {
        assert_eq!(
            CacheName::parse("app-v1.2.3").unwrap().version,
            Version::new(1, 2, 3)
        );
        let pre = CacheName::parse("app-v2-beta.1").unwrap();
        assert_eq!(pre.version.major, 2);
        assert!(!pre.version.pre.is_empty());
    }

    #[test]
    fn rejects_unversioned() {
        assert!(CacheName::parse("workbox-precache").is_none());
        assert!(CacheName::parse("-v1.0").is_none());
        assert!(CacheName::parse("app-vnext").is_none());
    }

    #[test]
    fn orders_by_version() {
        let mut names = vec![
            "streams-cache-v13.10",
            "legacy",
            "streams-cache-v13.2",
            "streams-cache-v9",
        ];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(
            names,
            vec![
                "streams-cache-v9",
                "streams-cache-v13.2",
                "streams-cache-v13.10",
                "legacy"
            ]
        );
    }
}

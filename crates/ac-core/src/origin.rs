//! Origin normalization
//!
//! Per-site settings and activation history are keyed by origin
//! (scheme + host + port), never by full URL.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Normalized origin of a page URL, e.g. `https://example.com` or
/// `http://localhost:8080`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    /// Parse the origin of `url`.
    ///
    /// Default ports are elided. URLs without a tuple origin (`about:blank`,
    /// `data:` and the like) are rejected.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url.trim()).map_err(|_| Error::InvalidOrigin(url.to_string()))?;
        let origin = parsed.origin();
        if !origin.is_tuple() {
            return Err(Error::InvalidOrigin(url.to_string()));
        }
        Ok(Self(origin.ascii_serialization()))
    }

    /// Like [`Origin::parse`] but maps failure to `None`.
    pub fn of(url: &str) -> Option<Self> {
        Self::parse(url).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Origin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// True for `http://` and `https://` URLs, the only pages the control surface
/// offers per-site switches for.
pub fn is_http_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_strips_path_and_query() {
        let origin = Origin::parse("https://Example.com/form?a=1#top").unwrap();
        assert_eq!(origin.as_str(), "https://example.com");
    }

    #[test]
    fn test_origin_keeps_explicit_port() {
        let origin = Origin::parse("http://localhost:8080/x").unwrap();
        assert_eq!(origin.as_str(), "http://localhost:8080");
    }

    #[test]
    fn test_origin_elides_default_port() {
        let origin = Origin::parse("https://example.com:443/").unwrap();
        assert_eq!(origin.as_str(), "https://example.com");
    }

    #[test]
    fn test_origin_rejects_garbage() {
        assert!(matches!(Origin::parse("not a url"), Err(Error::InvalidOrigin(_))));
        assert!(Origin::parse("").is_err());
        assert!(Origin::of("about:blank").is_none());
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("HTTPS://example.com"));
        assert!(is_http_url("http://x"));
        assert!(!is_http_url("chrome://extensions"));
    }
}

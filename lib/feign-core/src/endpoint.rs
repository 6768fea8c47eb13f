//! Endpoint management
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// A normalized base address of one app instance.
///
/// The stored form is the caller's URL with surrounding whitespace and any
/// trailing slashes removed, so `http://10.0.0.1:8080/` and
/// `http://10.0.0.1:8080` are the same endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    url: String,
}

impl Endpoint {
    /// Parse and normalize a candidate base URL.
    ///
    /// Fails with [`CoreError::Configuration`] when the URL does not parse or
    /// has no host to connect to.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize_url(raw);

        let parsed = Url::parse(normalized)
            .map_err(|e| CoreError::Configuration(format!("invalid url '{}': {}", raw, e)))?;

        if parsed.cannot_be_a_base() || parsed.host_str().map_or(true, str::is_empty) {
            return Err(CoreError::Configuration(format!(
                "url '{}' has no host",
                raw
            )));
        }

        Ok(Self {
            url: normalized.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

/// Strip surrounding whitespace and trailing slashes from a URL.
pub fn normalize_url(raw: &str) -> &str {
    raw.trim().trim_end_matches('/')
}

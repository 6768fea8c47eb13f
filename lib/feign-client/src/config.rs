//! Client configuration

use feign_core::DEFAULT_REFRESH_INTERVAL;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Identifying `User-Agent` sent when the caller sets none
pub const DEFAULT_USER_AGENT: &str = concat!("feign-rs/", env!("CARGO_PKG_VERSION"));

/// Configuration shared by every request issued through a [`crate::Feign`]
#[derive(Clone, Debug)]
pub struct FeignConfig {
    /// Interval between two full discovery pulls
    pub refresh_interval: Duration,
    /// Default `User-Agent` header value
    pub user_agent: String,
    /// Encode a body for GET requests too
    pub allow_get_payload: bool,
    /// Timeout of a single exchange on the default transport
    pub request_timeout: Duration,
}

impl Default for FeignConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_get_payload: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl FeignConfig {
    /// Load configuration from `FEIGN_*` environment variables.
    ///
    /// Unset variables keep their defaults; unparseable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, "FEIGN_REFRESH_INTERVAL_SECS") {
            config.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(agent) = lookup("FEIGN_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            config.user_agent = agent;
        }
        if let Some(allow) = parse_var::<bool, _>(&lookup, "FEIGN_ALLOW_GET_PAYLOAD") {
            config.allow_get_payload = allow;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "FEIGN_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}

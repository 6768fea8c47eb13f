//! App registry mapping logical app names to their live endpoints

use crate::endpoint::normalize_url;
use crate::Endpoint;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// AppRegistry maintains the current endpoint list of every known app
pub struct AppRegistry {
    // Map of app name to its endpoint set
    apps: Arc<RwLock<HashMap<String, EndpointSet>>>,
}

/// Snapshot of the endpoints registered for one app.
///
/// The endpoint list is immutable once stored; a replacement swaps in a new
/// list while the rotation cursor is shared across replacements.
#[derive(Clone, Debug)]
pub struct EndpointSet {
    endpoints: Arc<[Endpoint]>,
    cursor: Arc<AtomicUsize>,
}

impl EndpointSet {
    fn new(endpoints: Vec<Endpoint>, cursor: Arc<AtomicUsize>) -> Self {
        Self {
            endpoints: endpoints.into(),
            cursor,
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Rotation counter of the app, advanced by the load balancer
    pub fn cursor(&self) -> &AtomicUsize {
        &self.cursor
    }

    /// Endpoint URLs as strings
    pub fn urls(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.as_str().to_string()).collect()
    }
}

impl AppRegistry {
    pub fn new() -> Self {
        Self {
            apps: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replace the endpoint list of an app.
    ///
    /// Invalid URLs are skipped with a warning. When no candidate is valid the
    /// call changes nothing and any existing entry for `app` stays in place.
    /// Returns whether the entry was written.
    pub async fn set<I, S>(&self, app: &str, candidate_urls: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut endpoints = Vec::new();
        for candidate in candidate_urls {
            match Endpoint::parse(candidate.as_ref()) {
                Ok(endpoint) => endpoints.push(endpoint),
                Err(e) => warn!("Skipping url for app {}: {}", app, e),
            }
        }

        if endpoints.is_empty() {
            warn!("No valid urls for app {}, keeping existing endpoints", app);
            return false;
        }

        let count = endpoints.len();
        let mut apps = self.apps.write().await;
        let cursor = match apps.get(app) {
            Some(existing) => existing.cursor.clone(),
            None => Arc::new(AtomicUsize::new(clock_seed())),
        };
        apps.insert(app.to_string(), EndpointSet::new(endpoints, cursor));

        debug!("Registered {} endpoints for app: {}", count, app);
        true
    }

    /// Get the current endpoint set of an app
    pub async fn get(&self, app: &str) -> Option<EndpointSet> {
        let apps = self.apps.read().await;
        apps.get(app).cloned()
    }

    /// Check whether an app has been registered
    pub async fn contains(&self, app: &str) -> bool {
        let apps = self.apps.read().await;
        apps.contains_key(app)
    }

    /// Compare the stored endpoints of an app with freshly discovered URLs.
    ///
    /// The comparison is order-insensitive; an unknown app always counts as
    /// changed.
    pub async fn diff<S: AsRef<str>>(&self, app: &str, discovered_urls: &[S]) -> bool {
        let apps = self.apps.read().await;
        let Some(current) = apps.get(app) else {
            return true;
        };

        let current: HashSet<&str> = current.endpoints.iter().map(Endpoint::as_str).collect();
        let discovered: HashSet<&str> = discovered_urls
            .iter()
            .map(|u| normalize_url(u.as_ref()))
            .collect();

        current != discovered
    }

    /// List registered app names
    pub async fn app_names(&self) -> Vec<String> {
        let apps = self.apps.read().await;
        apps.keys().cloned().collect()
    }

    /// Get count of registered apps
    pub async fn app_count(&self) -> usize {
        let apps = self.apps.read().await;
        apps.len()
    }

    /// Drop every registered app
    pub async fn clear(&self) {
        let mut apps = self.apps.write().await;
        apps.clear();
        debug!("Cleared app registry");
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Starting point for a new app's rotation so that processes starting together
// do not all hit the same first endpoint.
fn clock_seed() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as usize)
        .unwrap_or(0)
}

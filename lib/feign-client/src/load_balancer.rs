//! Round-robin endpoint selection over the app registry

use feign_core::{AppRegistry, CoreError, Endpoint, EndpointSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Load balancer picking one endpoint of an app per call
#[derive(Clone)]
pub struct LoadBalancer {
    registry: Arc<AppRegistry>,
}

impl LoadBalancer {
    pub fn new(registry: Arc<AppRegistry>) -> Self {
        Self { registry }
    }

    /// Pick the next endpoint of `app` in rotation
    pub async fn pick(&self, app: &str) -> feign_core::Result<Endpoint> {
        let snapshot = self
            .registry
            .get(app)
            .await
            .ok_or_else(|| CoreError::NoAvailableEndpoint(app.to_string()))?;

        let endpoint = Self::select_round_robin(&snapshot)
            .ok_or_else(|| CoreError::NoAvailableEndpoint(app.to_string()))?;

        debug!("Picked endpoint {} for app {}", endpoint, app);
        Ok(endpoint)
    }

    /// Select endpoint using round-robin.
    ///
    /// The length is read from the same snapshot the index is applied to, so
    /// a concurrent replacement of the app's list can never push the index
    /// out of range.
    fn select_round_robin(set: &EndpointSet) -> Option<Endpoint> {
        let len = set.len();
        if len == 0 {
            return None;
        }

        let current = set.cursor().fetch_add(1, Ordering::SeqCst);
        set.endpoints().get(current % len).cloned()
    }
}

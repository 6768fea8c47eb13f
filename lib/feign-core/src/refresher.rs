//! Periodic synchronization of the app registry with a discovery client

use crate::{AppRegistry, CoreError, DiscoveryClient, Endpoint, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Interval between two full registry pulls
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Refresher keeps an [`AppRegistry`] in sync with one discovery client.
///
/// The background loop is started at most once per refresher; a registry
/// wired to a different discovery client gets a new refresher.
pub struct Refresher {
    registry: Arc<AppRegistry>,
    discovery: Arc<dyn DiscoveryClient>,
    interval: Duration,
    started: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl Refresher {
    pub fn new(
        registry: Arc<AppRegistry>,
        discovery: Arc<dyn DiscoveryClient>,
        interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            discovery,
            interval,
            started: AtomicBool::new(false),
            shutdown,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Spawn the background refresh loop.
    ///
    /// Only the first call spawns anything; it returns `true`, later calls
    /// return `false`. Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Refresher already started");
            return false;
        }

        let refresher = Arc::clone(self);
        let stop = self.shutdown.subscribe();
        tokio::spawn(async move { refresher.run(stop).await });
        true
    }

    /// Ask the background loop to exit at its next check
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
        debug!("Refresher stop requested");
    }

    async fn run(&self, mut stop: watch::Receiver<bool>) {
        info!("Starting registry refresh loop (interval: {:?})", self.interval);

        loop {
            if *stop.borrow() {
                break;
            }

            match self.refresh_all().await {
                Ok(count) => debug!("Registry refresh updated {} apps", count),
                Err(e) => warn!("Registry refresh failed, keeping cached endpoints: {}", e),
            }

            if *stop.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Registry refresh loop stopped");
    }

    /// Pull the full registry once and replace every app whose endpoints changed.
    ///
    /// Returns the number of apps written. A failed pull leaves the registry
    /// untouched.
    pub async fn refresh_all(&self) -> Result<usize> {
        let snapshot = self
            .discovery
            .registry_apps()
            .await
            .map_err(|e| CoreError::Discovery(e.to_string()))?;

        let mut updated = 0;
        for (app, descriptor) in &snapshot {
            let urls = descriptor.home_page_urls();
            if self.apply(app, &urls).await {
                updated += 1;
            }
        }

        Ok(updated)
    }

    /// Pull the registry and apply only the entry of `app`.
    ///
    /// Used when a caller asks for an app the registry has never seen.
    /// Returns whether the entry was written.
    pub async fn refresh_app(&self, app: &str) -> Result<bool> {
        let snapshot = self
            .discovery
            .registry_apps()
            .await
            .map_err(|e| CoreError::Discovery(e.to_string()))?;

        match snapshot.get(app) {
            Some(descriptor) => Ok(self.apply(app, &descriptor.home_page_urls()).await),
            None => {
                debug!("App {} is not known to the discovery client", app);
                Ok(false)
            }
        }
    }

    async fn apply(&self, app: &str, urls: &[String]) -> bool {
        let valid: Vec<String> = urls
            .iter()
            .filter_map(|url| match Endpoint::parse(url) {
                Ok(endpoint) => Some(endpoint.as_str().to_string()),
                Err(e) => {
                    debug!("Ignoring discovered url for app {}: {}", app, e);
                    None
                }
            })
            .collect();

        if valid.is_empty() {
            debug!("Registry reports no usable instances for app {}", app);
            return false;
        }

        if !self.registry.diff(app, &valid).await {
            return false;
        }

        self.registry.set(app, &valid).await
    }
}

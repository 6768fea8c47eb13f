//! Discovery collaborator: the read-only source of registry apps

use crate::endpoint::normalize_url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Mapping of app name to what the service registry reports for it
pub type RegistrySnapshot = HashMap<String, RegistryApp>;

/// An app as reported by the service registry
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryApp {
    pub name: String,
    pub instances: Vec<AppInstance>,
}

/// One registered instance of an app
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppInstance {
    pub instance_id: String,
    pub home_page_url: String,
}

impl RegistryApp {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: Vec::new(),
        }
    }

    /// Add an instance by its home page URL
    pub fn with_instance(mut self, home_page_url: impl Into<String>) -> Self {
        let home_page_url = home_page_url.into();
        self.instances.push(AppInstance {
            instance_id: format!("{}:{}", self.name, self.instances.len()),
            home_page_url,
        });
        self
    }

    /// Normalized home page URLs of all instances, in registry order
    pub fn home_page_urls(&self) -> Vec<String> {
        self.instances
            .iter()
            .map(|i| normalize_url(&i.home_page_url).to_string())
            .collect()
    }
}

/// Client of an external service registry
#[async_trait::async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// Fetch every app the registry currently knows about
    async fn registry_apps(&self) -> anyhow::Result<RegistrySnapshot>;
}

/// In-memory discovery client serving a replaceable snapshot.
///
/// Useful for wiring fixed topologies and for exercising the refresher.
#[derive(Default)]
pub struct StaticDiscovery {
    apps: RwLock<RegistrySnapshot>,
    failing: AtomicBool,
    pulls: AtomicUsize,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the instances reported for an app
    pub async fn set_app<I, S>(&self, name: &str, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let app = urls
            .into_iter()
            .fold(RegistryApp::new(name), |app, url| app.with_instance(url));
        let mut apps = self.apps.write().await;
        apps.insert(name.to_string(), app);
    }

    pub async fn remove_app(&self, name: &str) {
        let mut apps = self.apps.write().await;
        apps.remove(name);
    }

    /// Make subsequent pulls fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of pulls served so far, failed ones included
    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DiscoveryClient for StaticDiscovery {
    async fn registry_apps(&self) -> anyhow::Result<RegistrySnapshot> {
        self.pulls.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("registry unavailable");
        }

        let apps = self.apps.read().await;
        debug!("Serving {} static registry apps", apps.len());
        Ok(apps.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_page_urls_are_normalized() {
        let app = RegistryApp::new("ORDERS")
            .with_instance("http://10.0.0.1:8080/")
            .with_instance("http://10.0.0.2:8080");

        assert_eq!(
            app.home_page_urls(),
            vec!["http://10.0.0.1:8080", "http://10.0.0.2:8080"]
        );
        assert_eq!(app.instances[1].instance_id, "ORDERS:1");
    }

    #[tokio::test]
    async fn test_static_discovery() {
        let discovery = StaticDiscovery::new();
        discovery.set_app("ORDERS", ["http://a"]).await;

        let apps = discovery.registry_apps().await.unwrap();
        assert_eq!(apps["ORDERS"].home_page_urls(), vec!["http://a"]);

        discovery.remove_app("ORDERS").await;
        assert!(discovery.registry_apps().await.unwrap().is_empty());
        assert_eq!(discovery.pull_count(), 2);
    }

    #[tokio::test]
    async fn test_static_discovery_failure() {
        let discovery = StaticDiscovery::new();
        discovery.set_failing(true);
        assert!(discovery.registry_apps().await.is_err());

        discovery.set_failing(false);
        assert!(discovery.registry_apps().await.is_ok());
    }
}

//! Core app registry and discovery functionality
//!
//! This library provides:
//! - App registry mapping logical app names to normalized endpoints
//! - Discovery client abstraction over an external service registry
//! - Background refresher keeping the registry in sync with discovery

pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod refresher;
pub mod registry;

pub use discovery::{AppInstance, DiscoveryClient, RegistryApp, RegistrySnapshot, StaticDiscovery};
pub use endpoint::Endpoint;
pub use error::{CoreError, Result};
pub use refresher::{Refresher, DEFAULT_REFRESH_INTERVAL};
pub use registry::{AppRegistry, EndpointSet};

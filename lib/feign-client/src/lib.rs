//! Declarative HTTP client for apps resolved through a service registry
//!
//! This library provides:
//! - Round-robin endpoint selection over the app registry
//! - Request pipeline: URL composition, header normalization, body encoding
//! - Response pipeline: decoding into typed result and error values
//! - The `Feign` facade tying discovery, pipelines and transport together

pub mod body;
pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod load_balancer;
pub mod metrics;
pub mod middleware;
pub mod request;
pub mod response;
pub mod stages;
pub mod transport;

pub use body::{Body, Shape};
pub use client::{AppClient, Feign, FeignBuilder, RequestBuilder};
pub use config::{FeignConfig, DEFAULT_USER_AGENT};
pub use error::{ClientError, Result};
pub use load_balancer::LoadBalancer;
pub use metrics::MetricsCollector;
pub use middleware::{PipelineContext, RequestPipeline, RequestStage, ResponsePipeline, ResponseStage};
pub use request::{Params, RequestDescriptor};
pub use response::{DecodeSink, Response, TypedSink};
pub use transport::{HyperTransport, Transport, TransportRequest, TransportResponse};

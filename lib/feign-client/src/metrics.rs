//! Prometheus metrics for outgoing calls

use crate::Result;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

/// Prometheus metrics collector for calls issued through a client.
///
/// Clones share the same registry and metrics.
#[derive(Clone)]
pub struct MetricsCollector {
    /// Calls issued, by app and method
    pub requests_total: CounterVec,
    /// Responses received, by app and status
    pub responses_total: CounterVec,
    /// Time from endpoint pick to decoded response
    pub request_duration_seconds: HistogramVec,
    /// Calls failed because the app had no usable endpoint
    pub no_endpoint_total: CounterVec,
    /// Calls failed in the transport
    pub transport_errors_total: CounterVec,
    pub registry: Arc<Registry>,
}

impl MetricsCollector {
    /// Create a collector with its own registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create a collector registering into an existing registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let requests_total = CounterVec::new(
            Opts::new("feign_requests_total", "Total calls issued"),
            &["app", "method"],
        )?;

        let responses_total = CounterVec::new(
            Opts::new("feign_responses_total", "Total responses by status"),
            &["app", "status"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("feign_request_duration_seconds", "Call latency in seconds"),
            &["app"],
        )?;

        let no_endpoint_total = CounterVec::new(
            Opts::new("feign_no_endpoint_total", "Calls without an available endpoint"),
            &["app"],
        )?;

        let transport_errors_total = CounterVec::new(
            Opts::new("feign_transport_errors_total", "Calls failed in the transport"),
            &["app"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(responses_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(no_endpoint_total.clone()))?;
        registry.register(Box::new(transport_errors_total.clone()))?;

        Ok(Self {
            requests_total,
            responses_total,
            request_duration_seconds,
            no_endpoint_total,
            transport_errors_total,
            registry,
        })
    }

    pub fn record_request(&self, app: &str, method: &str) {
        self.requests_total.with_label_values(&[app, method]).inc();
    }

    pub fn record_response(&self, app: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        self.responses_total
            .with_label_values(&[app, status.as_str()])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[app])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_no_endpoint(&self, app: &str) {
        self.no_endpoint_total.with_label_values(&[app]).inc();
    }

    pub fn record_transport_error(&self, app: &str) {
        self.transport_errors_total.with_label_values(&[app]).inc();
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

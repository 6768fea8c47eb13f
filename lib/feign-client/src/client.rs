//! Client facade: resolves an app name to an endpoint, runs the request
//! pipeline, hands the result to the transport and decodes the response

use crate::body::Body;
use crate::config::FeignConfig;
use crate::load_balancer::LoadBalancer;
use crate::metrics::MetricsCollector;
use crate::middleware::{PipelineContext, RequestPipeline, ResponsePipeline};
use crate::request::RequestDescriptor;
use crate::response::{Response, TypedSink};
use crate::transport::{HyperTransport, Transport, TransportRequest};
use crate::{ClientError, Result};
use feign_core::{AppRegistry, DiscoveryClient, Refresher};
use hyper::header::{HeaderName, HeaderValue};
use hyper::Method;
use serde::de::DeserializeOwned;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, span, warn, Instrument, Level};

/// Entry point of the client.
///
/// Cheap to clone; clones share the registry, the refresher and the
/// transport.
#[derive(Clone)]
pub struct Feign {
    inner: Arc<FeignInner>,
}

struct FeignInner {
    registry: Arc<AppRegistry>,
    balancer: LoadBalancer,
    refresher: RwLock<Option<Arc<Refresher>>>,
    transport: Arc<dyn Transport>,
    config: FeignConfig,
    metrics: Option<MetricsCollector>,
    request_pipeline: RequestPipeline,
    response_pipeline: ResponsePipeline,
}

impl Drop for FeignInner {
    fn drop(&mut self) {
        if let Some(refresher) = self.refresher.get_mut().as_ref() {
            refresher.stop();
        }
    }
}

/// Builder for [`Feign`]
pub struct FeignBuilder {
    discovery: Option<Arc<dyn DiscoveryClient>>,
    transport: Option<Arc<dyn Transport>>,
    config: FeignConfig,
    metrics: Option<MetricsCollector>,
    request_pipeline: RequestPipeline,
    response_pipeline: ResponsePipeline,
}

impl FeignBuilder {
    fn new() -> Self {
        Self {
            discovery: None,
            transport: None,
            config: FeignConfig::default(),
            metrics: None,
            request_pipeline: RequestPipeline::default(),
            response_pipeline: ResponsePipeline::default(),
        }
    }

    /// Keep the registry in sync with this discovery client
    pub fn discovery_client(mut self, discovery: Arc<dyn DiscoveryClient>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Replace the default hyper transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(mut self, config: FeignConfig) -> Self {
        self.config = config;
        self
    }

    /// Record call metrics into this collector
    pub fn metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn request_pipeline(mut self, pipeline: RequestPipeline) -> Self {
        self.request_pipeline = pipeline;
        self
    }

    pub fn response_pipeline(mut self, pipeline: ResponsePipeline) -> Self {
        self.response_pipeline = pipeline;
        self
    }

    pub fn build(self) -> Feign {
        let registry = Arc::new(AppRegistry::new());
        let refresher = self.discovery.map(|discovery| {
            Arc::new(Refresher::new(
                registry.clone(),
                discovery,
                self.config.refresh_interval,
            ))
        });
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HyperTransport::new(self.config.request_timeout)));

        Feign {
            inner: Arc::new(FeignInner {
                balancer: LoadBalancer::new(registry.clone()),
                registry,
                refresher: RwLock::new(refresher),
                transport,
                config: self.config,
                metrics: self.metrics,
                request_pipeline: self.request_pipeline,
                response_pipeline: self.response_pipeline,
            }),
        }
    }
}

impl Feign {
    pub fn builder() -> FeignBuilder {
        FeignBuilder::new()
    }

    /// Process-wide default instance, configured from the environment and
    /// without a discovery client
    pub fn global() -> &'static Feign {
        static GLOBAL: OnceLock<Feign> = OnceLock::new();
        GLOBAL.get_or_init(|| Feign::builder().config(FeignConfig::from_env()).build())
    }

    pub fn registry(&self) -> &Arc<AppRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &FeignConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> Option<&MetricsCollector> {
        self.inner.metrics.as_ref()
    }

    /// Register fixed endpoint URLs for an app.
    ///
    /// Returns whether any URL was valid and the entry was written.
    pub async fn use_urls<I, S>(&self, app: &str, urls: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.registry.set(app, urls).await
    }

    /// Switch to another discovery client.
    ///
    /// The previous refresher is stopped; the new one starts on the next call.
    pub async fn use_discovery_client(&self, discovery: Arc<dyn DiscoveryClient>) {
        let refresher = Arc::new(Refresher::new(
            self.inner.registry.clone(),
            discovery,
            self.inner.config.refresh_interval,
        ));

        let previous = self.inner.refresher.write().await.replace(refresher);
        if let Some(previous) = previous {
            previous.stop();
        }
        info!("Discovery client replaced");
    }

    /// Handle for issuing calls to one app
    pub fn app(&self, name: impl Into<String>) -> AppClient {
        AppClient {
            feign: self.clone(),
            app: name.into(),
        }
    }

    /// Stop the background refresher, if any
    pub async fn shutdown(&self) {
        if let Some(refresher) = self.inner.refresher.read().await.as_ref() {
            refresher.stop();
        }
    }

    async fn current_refresher(&self) -> Option<Arc<Refresher>> {
        self.inner.refresher.read().await.clone()
    }

    async fn ensure_registered(&self, app: &str) {
        let Some(refresher) = self.current_refresher().await else {
            return;
        };

        refresher.start();

        if self.inner.registry.contains(app).await {
            return;
        }

        debug!("App {} not cached yet, pulling it from discovery", app);
        if let Err(e) = refresher.refresh_app(app).await {
            warn!("On-demand discovery pull for {} failed: {}", app, e);
        }
    }

    async fn execute(&self, app: &str, mut request: RequestDescriptor) -> Result<Response> {
        let inner = &self.inner;

        self.ensure_registered(app).await;

        if let Some(metrics) = &inner.metrics {
            metrics.record_request(app, request.method.as_str());
        }

        let endpoint = match inner.balancer.pick(app).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                if let Some(metrics) = &inner.metrics {
                    metrics.record_no_endpoint(app);
                }
                return Err(e.into());
            }
        };

        let started = Instant::now();
        let context = PipelineContext {
            app: app.to_string(),
            endpoint,
            user_agent: inner.config.user_agent.clone(),
            allow_get_payload: inner.config.allow_get_payload,
        };

        inner.request_pipeline.process(&context, &mut request)?;

        let url = request.url.clone().ok_or_else(|| {
            ClientError::InvalidUrl(format!("no url composed for {}", request.path))
        })?;
        let wire = TransportRequest {
            method: request.method.clone(),
            url,
            headers: request.headers.clone(),
            body: request.encoded_body.clone(),
        };

        let raw = inner.transport.execute(wire).await.map_err(|e| {
            if let Some(metrics) = &inner.metrics {
                metrics.record_transport_error(app);
            }
            ClientError::Transport(format!("{:#}", e))
        })?;

        let mut response = Response::new(raw.status, raw.headers, raw.body);
        inner
            .response_pipeline
            .process(&context, &request, &mut response)?;

        if let Some(metrics) = &inner.metrics {
            metrics.record_response(app, response.status().as_u16(), started.elapsed());
        }
        debug!("{} {} answered {}", request.method, context.endpoint, response.status());

        Ok(response)
    }
}

/// Handle bound to one app name
#[derive(Clone)]
pub struct AppClient {
    feign: Feign,
    app: String,
}

impl AppClient {
    pub fn name(&self) -> &str {
        &self.app
    }

    /// Start describing a new call
    pub fn request(&self) -> RequestBuilder {
        RequestBuilder {
            client: self.clone(),
            descriptor: RequestDescriptor::new(Method::GET, ""),
            error: None,
        }
    }
}

/// Per-call request description.
///
/// Invalid header names or values are reported when the call executes.
pub struct RequestBuilder {
    client: AppClient,
    descriptor: RequestDescriptor,
    error: Option<ClientError>,
}

impl RequestBuilder {
    /// Set a header, replacing earlier values of the same name
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let header_name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(header_name) => header_name,
            Err(e) => {
                self.fail(ClientError::InvalidHeader(format!("{}: {}", name, e)));
                return self;
            }
        };

        match HeaderValue::from_str(value) {
            Ok(header_value) => {
                self.descriptor.headers.insert(header_name, header_value);
            }
            Err(e) => self.fail(ClientError::InvalidHeader(format!("{}={:?}: {}", name, value, e))),
        }
        self
    }

    pub fn headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .into_iter()
            .fold(self, |builder, (k, v)| builder.header(k.as_ref(), v.as_ref()))
    }

    /// Set a query parameter, replacing earlier values of the same name
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor
            .query_params
            .insert(key.into(), vec![value.into()]);
        self
    }

    pub fn query_params<I, K, V>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        params
            .into_iter()
            .fold(self, |builder, (k, v)| builder.query_param(k, v))
    }

    /// Append every value to its query parameter
    pub fn multi_value_query_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, values) in params {
            self.descriptor
                .query_params
                .entry(key.into())
                .or_default()
                .extend(values.into_iter().map(Into::into));
        }
        self
    }

    /// Append the parameters of a raw `a=1&b=2` query string
    pub fn query_string(mut self, query: &str) -> Self {
        let query = query.trim().trim_start_matches('?');
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()).into_owned() {
            self.descriptor
                .query_params
                .entry(key)
                .or_default()
                .push(value);
        }
        self
    }

    pub fn form_data<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in fields {
            self.descriptor
                .form_data
                .insert(key.into(), vec![value.into()]);
        }
        self
    }

    pub fn multi_value_form_data<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, values) in fields {
            self.descriptor
                .form_data
                .entry(key.into())
                .or_default()
                .extend(values.into_iter().map(Into::into));
        }
        self
    }

    /// Values for `{name}` segments of the path
    pub fn path_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.descriptor
            .path_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.descriptor.body = body.into();
        self
    }

    /// Decode a 2xx body into `T`
    pub fn result<T>(mut self) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.descriptor.result = Some(Box::new(TypedSink::<T>::new()));
        self
    }

    /// Decode a 4xx/5xx body into `E`
    pub fn error<E>(mut self) -> Self
    where
        E: DeserializeOwned + Send + Sync + 'static,
    {
        self.descriptor.error = Some(Box::new(TypedSink::<E>::new()));
        self
    }

    /// Content type to decode with when the response carries none
    pub fn expect_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.descriptor.fallback_content_type = Some(content_type.into());
        self
    }

    /// Send form data as `multipart/form-data`
    pub fn multipart(mut self) -> Self {
        self.descriptor.multipart = true;
        self
    }

    /// Send an explicit `Content-Length`
    pub fn content_length(mut self, enabled: bool) -> Self {
        self.descriptor.set_content_length = enabled;
        self
    }

    pub async fn get(self, path: &str) -> Result<Response> {
        self.execute(Method::GET, path).await
    }

    pub async fn head(self, path: &str) -> Result<Response> {
        self.execute(Method::HEAD, path).await
    }

    pub async fn post(self, path: &str) -> Result<Response> {
        self.execute(Method::POST, path).await
    }

    pub async fn put(self, path: &str) -> Result<Response> {
        self.execute(Method::PUT, path).await
    }

    pub async fn delete(self, path: &str) -> Result<Response> {
        self.execute(Method::DELETE, path).await
    }

    pub async fn options(self, path: &str) -> Result<Response> {
        self.execute(Method::OPTIONS, path).await
    }

    pub async fn patch(self, path: &str) -> Result<Response> {
        self.execute(Method::PATCH, path).await
    }

    /// Issue the call with an arbitrary method
    pub async fn execute(mut self, method: Method, path: &str) -> Result<Response> {
        if let Some(e) = self.error {
            return Err(e);
        }

        self.descriptor.method = method;
        self.descriptor.path = path.to_string();

        let span = span!(
            Level::DEBUG,
            "call",
            app = %self.client.app,
            method = %self.descriptor.method,
            path = %path
        );
        self.client
            .feign
            .execute(&self.client.app, self.descriptor)
            .instrument(span)
            .await
    }

    fn fail(&mut self, error: ClientError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportResponse;
    use async_trait::async_trait;
    use bytes::Bytes;
    use feign_core::{CoreError, StaticDiscovery};
    use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
    use hyper::{HeaderMap, StatusCode};
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct MockTransport {
        seen: Mutex<Vec<TransportRequest>>,
        status: StatusCode,
        content_type: Option<&'static str>,
        body: &'static [u8],
        fail: bool,
    }

    impl MockTransport {
        fn new(status: StatusCode, content_type: Option<&'static str>, body: &'static [u8]) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                status,
                content_type,
                body,
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                status: StatusCode::OK,
                content_type: None,
                body: b"",
                fail: true,
            })
        }

        fn requests(&self) -> Vec<TransportRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn execute(&self, request: TransportRequest) -> anyhow::Result<TransportResponse> {
            self.seen.lock().unwrap().push(request);
            if self.fail {
                anyhow::bail!("connection refused");
            }

            let mut headers = HeaderMap::new();
            if let Some(ct) = self.content_type {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
            }
            Ok(TransportResponse {
                status: self.status,
                headers,
                body: Bytes::from_static(self.body),
            })
        }
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    #[derive(Deserialize, Debug)]
    struct ApiError {
        message: String,
    }

    fn feign_with(transport: Arc<MockTransport>) -> Feign {
        Feign::builder()
            .transport(transport)
            .metrics(MetricsCollector::new().unwrap())
            .build()
    }

    #[tokio::test]
    async fn test_get_composes_url_and_decodes_result() {
        let transport = MockTransport::new(
            StatusCode::OK,
            Some("application/json"),
            br#"{"id":42,"name":"ann"}"#,
        );
        let feign = feign_with(transport.clone());
        feign.use_urls("USERS", ["http://10.0.0.1:8080/"]).await;

        let mut response = feign
            .app("USERS")
            .request()
            .path_params([("userId", "42")])
            .query_param("verbose", "true")
            .result::<User>()
            .get("/v1/users/{userId}")
            .await
            .unwrap();

        assert_eq!(
            response.take_result::<User>(),
            Some(User {
                id: 42,
                name: "ann".to_string()
            })
        );

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::GET);
        assert_eq!(sent[0].url.as_str(), "http://10.0.0.1:8080/v1/users/42?verbose=true");
        assert_eq!(sent[0].headers[USER_AGENT], crate::DEFAULT_USER_AGENT);
        assert!(sent[0].body.is_none());
    }

    #[tokio::test]
    async fn test_post_object_body_as_json() {
        let transport = MockTransport::new(StatusCode::CREATED, None, b"");
        let feign = feign_with(transport.clone());
        feign.use_urls("USERS", ["http://10.0.0.1:8080"]).await;

        let response = feign
            .app("USERS")
            .request()
            .body(Body::object(User {
                id: 1,
                name: "bob".to_string(),
            }))
            .content_length(true)
            .post("/v1/users")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let sent = transport.requests();
        assert_eq!(sent[0].headers[CONTENT_TYPE], "application/json; charset=utf-8");
        assert_eq!(sent[0].headers[CONTENT_LENGTH], "21");
        assert_eq!(sent[0].body.as_deref(), Some(&br#"{"id":1,"name":"bob"}"#[..]));
    }

    #[tokio::test]
    async fn test_error_status_decodes_into_error_sink() {
        let transport = MockTransport::new(
            StatusCode::NOT_FOUND,
            Some("application/problem+json"),
            br#"{"message":"no such user"}"#,
        );
        let feign = feign_with(transport);
        feign.use_urls("USERS", ["http://10.0.0.1:8080"]).await;

        let response = feign
            .app("USERS")
            .request()
            .result::<User>()
            .error::<ApiError>()
            .get("/v1/users/9")
            .await
            .unwrap();

        assert!(response.is_error());
        assert!(response.result::<User>().is_none());
        assert_eq!(response.error::<ApiError>().unwrap().message, "no such user");
    }

    #[tokio::test]
    async fn test_unknown_app_without_discovery() {
        let transport = MockTransport::new(StatusCode::OK, None, b"");
        let feign = feign_with(transport.clone());

        let err = feign.app("MISSING").request().get("/").await.unwrap_err();
        assert!(err.is_no_available_endpoint());
        assert!(matches!(
            err,
            ClientError::Core(CoreError::NoAvailableEndpoint(ref app)) if app == "MISSING"
        ));
        assert!(transport.requests().is_empty());

        let metrics = feign.metrics().unwrap().gather().unwrap();
        assert!(metrics.contains(r#"feign_no_endpoint_total{app="MISSING"} 1"#));
    }

    #[tokio::test]
    async fn test_unknown_app_is_pulled_from_discovery() {
        let discovery = Arc::new(StaticDiscovery::new());
        discovery.set_app("ORDERS", ["http://10.0.1.1:9000/"]).await;

        let transport = MockTransport::new(StatusCode::OK, None, b"ok");
        let feign = Feign::builder()
            .discovery_client(discovery.clone())
            .transport(transport.clone())
            .build();

        let response = feign.app("ORDERS").request().get("/health").await.unwrap();
        assert_eq!(response.text(), "ok");
        assert_eq!(transport.requests()[0].url.as_str(), "http://10.0.1.1:9000/health");
        assert!(discovery.pull_count() >= 1);

        feign.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_discovery_keeps_serving_cached_endpoints() {
        let discovery = Arc::new(StaticDiscovery::new());
        discovery.set_failing(true);

        let transport = MockTransport::new(StatusCode::OK, None, b"");
        let feign = Feign::builder()
            .discovery_client(discovery)
            .transport(transport.clone())
            .build();
        feign.use_urls("ORDERS", ["http://10.0.1.1:9000"]).await;

        feign.app("ORDERS").request().get("/").await.unwrap();
        let err = feign.app("UNKNOWN").request().get("/").await.unwrap_err();
        assert!(err.is_no_available_endpoint());

        feign.shutdown().await;
    }

    #[tokio::test]
    async fn test_calls_rotate_over_endpoints() {
        let transport = MockTransport::new(StatusCode::OK, None, b"");
        let feign = feign_with(transport.clone());
        feign
            .use_urls("USERS", ["http://10.0.0.1:8080", "http://10.0.0.2:8080"])
            .await;

        let client = feign.app("USERS");
        for _ in 0..4 {
            client.request().get("/").await.unwrap();
        }

        let hosts: Vec<String> = transport
            .requests()
            .iter()
            .map(|r| r.url.host_str().unwrap_or_default().to_string())
            .collect();
        assert_ne!(hosts[0], hosts[1]);
        assert_eq!(hosts[0], hosts[2]);
        assert_eq!(hosts[1], hosts[3]);
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let transport = MockTransport::failing();
        let feign = feign_with(transport);
        feign.use_urls("USERS", ["http://10.0.0.1:8080"]).await;

        let err = feign.app("USERS").request().get("/").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(ref msg) if msg.contains("connection refused")));

        let metrics = feign.metrics().unwrap().gather().unwrap();
        assert!(metrics.contains(r#"feign_transport_errors_total{app="USERS"} 1"#));
    }

    #[tokio::test]
    async fn test_invalid_header_is_reported_at_execute() {
        let transport = MockTransport::new(StatusCode::OK, None, b"");
        let feign = feign_with(transport.clone());
        feign.use_urls("USERS", ["http://10.0.0.1:8080"]).await;

        let err = feign
            .app("USERS")
            .request()
            .header("bad header", "x")
            .get("/")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidHeader(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_form_query_string_and_headers() {
        let transport = MockTransport::new(StatusCode::OK, None, b"");
        let feign = feign_with(transport.clone());
        feign.use_urls("USERS", ["http://10.0.0.1:8080"]).await;

        let mut params = BTreeMap::new();
        params.insert("tag", vec!["a", "b"]);

        feign
            .app("USERS")
            .request()
            .headers([("X-Request-Id", "r-1"), ("User-Agent", "custom/1")])
            .query_string("?page=2&sort=asc")
            .multi_value_query_params(params)
            .form_data([("user", "ann")])
            .put("/v1/profile")
            .await
            .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(
            sent.url.as_str(),
            "http://10.0.0.1:8080/v1/profile?page=2&sort=asc&tag=a&tag=b"
        );
        assert_eq!(sent.headers["x-request-id"], "r-1");
        assert_eq!(sent.headers[USER_AGENT], "custom/1");
        assert_eq!(sent.headers[CONTENT_TYPE], "application/x-www-form-urlencoded");
        assert_eq!(sent.body.as_deref(), Some(&b"user=ann"[..]));
    }

    #[tokio::test]
    async fn test_get_body_is_not_sent() {
        let transport = MockTransport::new(StatusCode::OK, None, b"");
        let feign = feign_with(transport.clone());
        feign.use_urls("USERS", ["http://10.0.0.1:8080"]).await;

        feign
            .app("USERS")
            .request()
            .body("payload")
            .get("/")
            .await
            .unwrap();
        assert!(transport.requests()[0].body.is_none());
    }

    #[tokio::test]
    async fn test_use_discovery_client_stops_previous_refresher() {
        let first = Arc::new(StaticDiscovery::new());
        let transport = MockTransport::new(StatusCode::OK, None, b"");
        let feign = Feign::builder()
            .discovery_client(first)
            .transport(transport)
            .build();

        let previous = feign.current_refresher().await.unwrap();
        feign.use_discovery_client(Arc::new(StaticDiscovery::new())).await;

        assert!(previous.is_stopped());
        let current = feign.current_refresher().await.unwrap();
        assert!(!Arc::ptr_eq(&previous, &current));
        assert!(!current.is_stopped());

        feign.shutdown().await;
        assert!(current.is_stopped());
    }

    #[tokio::test]
    async fn test_dropping_last_handle_stops_refresher() {
        let discovery = Arc::new(StaticDiscovery::new());
        discovery.set_app("ORDERS", ["http://10.0.1.1:9000"]).await;
        let transport = MockTransport::new(StatusCode::OK, None, b"");
        let feign = Feign::builder()
            .discovery_client(discovery)
            .transport(transport)
            .build();

        let client = feign.app("ORDERS");
        client.request().get("/").await.unwrap();
        let refresher = feign.current_refresher().await.unwrap();

        drop(feign);
        assert!(!refresher.is_stopped());

        drop(client);
        assert!(refresher.is_stopped());
    }

    #[test]
    fn test_global_instance_is_shared() {
        let a = Feign::global();
        let b = Feign::global();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }
}

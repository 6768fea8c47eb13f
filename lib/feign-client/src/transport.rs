//! Wire-level HTTP exchange
//!
//! The pipelines hand a fully composed [`TransportRequest`] to a
//! [`Transport`]; the default implementation is a hyper client.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{HeaderMap, Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::tokio::TokioExecutor;
use std::time::Duration;
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, warn};
use url::Url;

/// Request ready to be put on the wire
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Raw response as received from the wire
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Executes one HTTP exchange
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// Plain-HTTP transport with a per-exchange timeout.
///
/// Every exchange opens its own connection; nothing is kept idle between
/// calls.
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HyperTransport {
    pub fn new(timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build::<_, Full<Bytes>>(connector);

        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_request(request: TransportRequest) -> Result<Request<Full<Bytes>>> {
        let uri: Uri = request
            .url
            .as_str()
            .parse()
            .with_context(|| format!("invalid request uri {}", request.url))?;

        let mut builder = Request::builder().method(request.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers);
        }

        let body = request.body.unwrap_or_default();
        Ok(builder.body(Full::new(body))?)
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        if request.url.scheme() != "http" {
            warn!("Unsupported scheme for {}", request.url);
            bail!("scheme '{}' is not supported by this transport", request.url.scheme());
        }

        debug!("Sending {} {}", request.method, request.url);
        let url = request.url.clone();
        let outgoing = Self::build_request(request)?;

        let response = match tokio_timeout(self.timeout, self.client.request(outgoing)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => bail!("request to {} failed: {}", url, e),
            Err(_) => bail!("request to {} timed out after {:?}", url, self.timeout),
        };

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .with_context(|| format!("reading response body from {}", url))?
            .to_bytes();

        debug!("{} responded {} with {} bytes", url, parts.status, body.len());
        Ok(TransportResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_transport_creation() {
        let transport = HyperTransport::new(Duration::from_secs(5));
        assert_eq!(transport.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_build_request() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let request = TransportRequest {
            method: Method::POST,
            url: Url::parse("http://10.0.0.1:8080/v1/users?x=1").unwrap(),
            headers,
            body: Some(Bytes::from_static(b"{}")),
        };

        let built = HyperTransport::build_request(request).unwrap();
        assert_eq!(built.method(), Method::POST);
        assert_eq!(built.uri().path_and_query().unwrap().as_str(), "/v1/users?x=1");
        assert_eq!(built.headers()[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_https_is_rejected() {
        let transport = HyperTransport::new(Duration::from_secs(1));
        let request = TransportRequest {
            method: Method::GET,
            url: Url::parse("https://example.com/").unwrap(),
            headers: HeaderMap::new(),
            body: None,
        };
        let err = transport.execute(request).await.unwrap_err();
        assert!(err.to_string().contains("https"));
    }

    #[tokio::test]
    async fn test_each_exchange_uses_a_new_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let mut seen = Vec::new();
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => seen.extend_from_slice(&buf[..n]),
                        }
                        if seen.windows(4).any(|w| w == b"\r\n\r\n") {
                            seen.clear();
                            let reply = b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok";
                            if socket.write_all(reply).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });

        let transport = HyperTransport::new(Duration::from_secs(2));
        for _ in 0..2 {
            let request = TransportRequest {
                method: Method::GET,
                url: Url::parse(&format!("http://{}/", addr)).unwrap(),
                headers: HeaderMap::new(),
                body: None,
            };
            let response = transport.execute(request).await.unwrap();
            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.body, Bytes::from_static(b"ok"));
        }

        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_connection_refused_is_an_error() {
        let transport = HyperTransport::new(Duration::from_secs(2));
        let request = TransportRequest {
            method: Method::GET,
            url: Url::parse("http://127.0.0.1:1/").unwrap(),
            headers: HeaderMap::new(),
            body: None,
        };
        assert!(transport.execute(request).await.is_err());
    }
}

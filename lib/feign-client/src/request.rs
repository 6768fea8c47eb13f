//! Declarative description of one outgoing call

use crate::body::Body;
use crate::response::DecodeSink;
use bytes::Bytes;
use hyper::{HeaderMap, Method};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use url::Url;

/// Multi-valued parameters keyed by name, encoded in key order
pub type Params = BTreeMap<String, Vec<String>>;

/// Everything the request pipeline needs to build a wire-level request.
///
/// The caller fills in the declarative part; request stages fill in `url`
/// and `encoded_body` and adjust `headers`.
pub struct RequestDescriptor {
    pub method: Method,
    /// Path template, optionally with a query string; `{name}` segments
    /// are replaced from `path_params`
    pub path: String,
    pub path_params: HashMap<String, String>,
    pub query_params: Params,
    pub form_data: Params,
    pub multipart: bool,
    pub headers: HeaderMap,
    pub body: Body,
    pub result: Option<Box<dyn DecodeSink>>,
    pub error: Option<Box<dyn DecodeSink>>,
    /// Content type assumed for decoding when the response carries none
    pub fallback_content_type: Option<String>,
    pub set_content_length: bool,

    /// Absolute URL composed from the picked endpoint
    pub url: Option<Url>,
    /// Final body bytes handed to the transport
    pub encoded_body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: HashMap::new(),
            query_params: Params::new(),
            form_data: Params::new(),
            multipart: false,
            headers: HeaderMap::new(),
            body: Body::Empty,
            result: None,
            error: None,
            fallback_content_type: None,
            set_content_length: false,
            url: None,
            encoded_body: None,
        }
    }

    /// Header value as a string, empty or non-UTF-8 values count as unset
    pub fn header_str(&self, name: impl hyper::header::AsHeaderName) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("path_params", &self.path_params)
            .field("query_params", &self.query_params)
            .field("form_data", &self.form_data)
            .field("multipart", &self.multipart)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("has_result_sink", &self.result.is_some())
            .field("has_error_sink", &self.error.is_some())
            .field("fallback_content_type", &self.fallback_content_type)
            .field("set_content_length", &self.set_content_length)
            .field("url", &self.url.as_ref().map(Url::as_str))
            .finish()
    }
}

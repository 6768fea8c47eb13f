//! Decoded response of one call

use crate::content::BodyFormat;
use crate::{ClientError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Value produced by a [`DecodeSink`]
pub type Decoded = Box<dyn Any + Send + Sync>;

/// Destination for an automatically decoded response body
pub trait DecodeSink: Send + Sync {
    /// Name of the target type, for logs and errors
    fn type_name(&self) -> &'static str;

    fn decode(&self, format: BodyFormat, body: &[u8]) -> Result<Decoded>;
}

/// Sink decoding into a concrete deserializable type
pub struct TypedSink<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSink<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DecodeSink for TypedSink<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn decode(&self, format: BodyFormat, body: &[u8]) -> Result<Decoded> {
        let decoded: T = match format {
            BodyFormat::Json => serde_json::from_slice(body).map_err(|e| {
                ClientError::Decode(format!("json into {}: {}", self.type_name(), e))
            })?,
            BodyFormat::Xml => quick_xml::de::from_reader(body).map_err(|e| {
                ClientError::Decode(format!("xml into {}: {}", self.type_name(), e))
            })?,
        };
        Ok(Box::new(decoded))
    }
}

/// Response of a call: status, headers and the raw body, plus whatever the
/// registered sinks decoded from it
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    received_at: DateTime<Utc>,
    pub(crate) result: Option<Decoded>,
    pub(crate) error: Option<Decoded>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            received_at: Utc::now(),
            result: None,
            error: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body as received
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text, lossily converted
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_error(&self) -> bool {
        self.status.as_u16() >= 400
    }

    /// Decoded success body, when a result sink of type `T` was registered
    pub fn result<T: 'static>(&self) -> Option<&T> {
        self.result.as_ref()?.downcast_ref::<T>()
    }

    /// Decoded error body, when an error sink of type `E` was registered
    pub fn error<E: 'static>(&self) -> Option<&E> {
        self.error.as_ref()?.downcast_ref::<E>()
    }

    /// Take ownership of the decoded success body
    pub fn take_result<T: 'static>(&mut self) -> Option<T> {
        take_decoded(&mut self.result)
    }

    /// Take ownership of the decoded error body
    pub fn take_error<E: 'static>(&mut self) -> Option<E> {
        take_decoded(&mut self.error)
    }
}

fn take_decoded<T: 'static>(slot: &mut Option<Decoded>) -> Option<T> {
    match slot.take()?.downcast::<T>() {
        Ok(value) => Some(*value),
        Err(other) => {
            // Wrong type requested, leave the value in place
            *slot = Some(other);
            None
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("received_at", &self.received_at)
            .field("has_result", &self.result.is_some())
            .field("has_error", &self.error.is_some())
            .finish()
    }
}

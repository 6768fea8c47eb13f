//! Request body payloads

use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::io::Read;

/// Payload of an outgoing request before encoding
#[derive(Default)]
pub enum Body {
    /// No payload
    #[default]
    Empty,
    /// Raw bytes, sent unchanged
    Bytes(Bytes),
    /// Text, sent unchanged
    Text(String),
    /// Structured value marshalled according to the negotiated content type
    Object(ObjectBody),
    /// Stream drained into the request body during encoding
    Reader(Box<dyn Read + Send + Sync>),
}

/// Overall shape of a structured value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// A struct or a mapping
    Record,
    /// A list of values
    Sequence,
}

/// Type-erased serializable value
pub struct ObjectBody {
    value: Box<dyn Marshal>,
    shape: Shape,
}

trait Marshal: Send + Sync {
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
    fn to_xml(&self) -> Result<String, quick_xml::DeError>;
}

impl<T: Serialize + Send + Sync> Marshal for T {
    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    fn to_xml(&self) -> Result<String, quick_xml::DeError> {
        quick_xml::se::to_string(self)
    }
}

impl ObjectBody {
    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        self.value.to_json()
    }

    pub fn to_xml(&self) -> Result<String, quick_xml::DeError> {
        self.value.to_xml()
    }
}

impl Body {
    /// Wrap a serializable value
    pub fn object<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        let shape = match serde_json::to_value(&value) {
            Ok(serde_json::Value::Array(_)) => Shape::Sequence,
            _ => Shape::Record,
        };
        Body::Object(ObjectBody {
            value: Box::new(value),
            shape,
        })
    }

    /// Wrap a reader
    pub fn reader<R>(reader: R) -> Self
    where
        R: Read + Send + Sync + 'static,
    {
        Body::Reader(Box::new(reader))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Short label used in logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Empty => "empty",
            Body::Bytes(_) => "bytes",
            Body::Text(_) => "text",
            Body::Object(object) => match object.shape {
                Shape::Record => "record",
                Shape::Sequence => "sequence",
            },
            Body::Reader(_) => "reader",
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Bytes(bytes) => write!(f, "Body::Bytes({} bytes)", bytes.len()),
            Body::Text(text) => write!(f, "Body::Text({} chars)", text.len()),
            other => write!(f, "Body::{}", other.kind()),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Body::Bytes(Bytes::from_static(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

//! Content type negotiation and detection

use crate::body::Body;

pub const PLAIN_TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const OCTET_STREAM_CONTENT_TYPE: &str = "application/octet-stream";

const JSON_TYPES: [&str; 4] = [
    "application/json",
    "text/json",
    "application/problem+json",
    "text/problem+json",
];

const XML_TYPES: [&str; 4] = [
    "application/xml",
    "text/xml",
    "application/problem+xml",
    "text/problem+xml",
];

/// Wire formats that structured bodies are marshalled to and from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Xml,
}

impl BodyFormat {
    /// Resolve the marshaller for a content type, if there is one
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        if is_json_type(content_type) {
            Some(BodyFormat::Json)
        } else if is_xml_type(content_type) {
            Some(BodyFormat::Xml)
        } else {
            None
        }
    }
}

/// Check for a JSON content type (`application/json`, `text/problem+json`, ...)
pub fn is_json_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    JSON_TYPES.iter().any(|t| content_type.contains(t))
}

/// Check for an XML content type (`application/xml`, `text/problem+xml`, ...)
pub fn is_xml_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    XML_TYPES.iter().any(|t| content_type.contains(t))
}

/// Pick a content type for a body the caller did not label
pub fn detect_content_type(body: &Body) -> &'static str {
    match body {
        // Records, mappings and sequences all default to JSON
        Body::Object(_) => JSON_CONTENT_TYPE,
        Body::Text(_) | Body::Empty => PLAIN_TEXT_CONTENT_TYPE,
        Body::Bytes(bytes) => sniff_content_type(bytes),
        Body::Reader(_) => OCTET_STREAM_CONTENT_TYPE,
    }
}

// Markup prefixes that identify an HTML document, matched case-insensitively
// and followed by a space or '>'.
const HTML_PREFIXES: [&[u8]; 17] = [
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const SIGNATURES: [(&[u8], &str); 8] = [
    (b"%PDF-", "application/pdf"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
];

/// Guess the content type of raw bytes from their leading signature.
///
/// Only the first 512 bytes are considered. Text without binary control
/// bytes is reported as UTF-8 plain text.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(512)];

    let start = data
        .iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    let markup = &data[start..];

    for prefix in HTML_PREFIXES {
        if has_tag_prefix(markup, prefix) {
            return "text/html; charset=utf-8";
        }
    }
    if markup.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    for (signature, content_type) in SIGNATURES {
        if data.starts_with(signature) {
            return content_type;
        }
    }

    if data.iter().any(|b| is_binary_byte(*b)) {
        OCTET_STREAM_CONTENT_TYPE
    } else {
        PLAIN_TEXT_CONTENT_TYPE
    }
}

fn has_tag_prefix(data: &[u8], prefix: &[u8]) -> bool {
    if data.len() <= prefix.len() || !data[..prefix.len()].eq_ignore_ascii_case(prefix) {
        return false;
    }
    matches!(data[prefix.len()], b' ' | b'>')
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

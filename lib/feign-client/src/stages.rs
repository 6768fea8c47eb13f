//! Built-in pipeline stages

use crate::body::{Body, ObjectBody, Shape};
use crate::content::{detect_content_type, is_json_type, is_xml_type, BodyFormat, FORM_CONTENT_TYPE};
use crate::middleware::{PipelineContext, RequestStage, ResponseStage};
use crate::request::{Params, RequestDescriptor};
use crate::response::Response;
use crate::{ClientError, Result};
use bytes::Bytes;
use hyper::header::{HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use hyper::Method;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;
use url::Url;

/// Resolve the path template against the picked endpoint and merge query
/// parameters into the final absolute URL
pub struct ComposeUrl;

impl RequestStage for ComposeUrl {
    fn name(&self) -> &'static str {
        "ComposeUrl"
    }

    fn process(&self, context: &PipelineContext, request: &mut RequestDescriptor) -> Result<()> {
        let (template, base_query) = request
            .path
            .split_once('?')
            .unwrap_or((request.path.as_str(), ""));

        let path = compose_request_path(template, &request.path_params);
        let raw = format!("{}{}", context.endpoint, path);
        let mut url =
            Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", raw, e)))?;

        let query = merge_query(base_query, &request.query_params);
        if query.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        debug!("Composed request url: {}", url);
        request.url = Some(url);
        Ok(())
    }
}

/// Characters escaped in a substituted path parameter value, so the value
/// stays inside its own segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Replace `{name}` path segments with their parameter values.
///
/// Substituted values are percent-encoded as a single segment. A placeholder
/// without a matching parameter stays in the path as written. The result
/// always starts with `/`, keeps a trailing slash present in the template,
/// and has empty and `.` template segments removed.
pub fn compose_request_path(template: &str, path_params: &HashMap<String, String>) -> String {
    let has_trailing_slash = template.len() > 1 && template.ends_with('/');

    let mut segments: Vec<String> = Vec::new();
    for segment in template.split('/') {
        let value = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .and_then(|key| path_params.get(key));

        match (value, segment) {
            (Some(value), _) if value.is_empty() => {}
            (Some(value), _) => segments.push(utf8_percent_encode(value, PATH_SEGMENT).to_string()),
            (None, "" | ".") => {}
            (None, "..") => {
                segments.pop();
            }
            (None, literal) => segments.push(literal.to_string()),
        }
    }

    let mut path = format!("/{}", segments.join("/"));
    if has_trailing_slash && !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// Merge request-level query parameters over an existing query string.
///
/// Keys set on the request replace every value of the same key in the
/// existing query; other keys keep their order.
pub fn merge_query(base_query: &str, overrides: &Params) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = url::form_urlencoded::parse(base_query.as_bytes())
        .into_owned()
        .filter(|(key, _)| !overrides.contains_key(key))
        .collect();

    merged.extend(param_pairs(overrides).map(|(k, v)| (k.to_string(), v.to_string())));
    merged
}

fn param_pairs(params: &Params) -> impl Iterator<Item = (&str, &str)> {
    params
        .iter()
        .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
}

/// Fill in the identifying `User-Agent` and mirror a JSON/XML
/// `Content-Type` into a missing `Accept`
pub struct NormalizeHeaders;

impl RequestStage for NormalizeHeaders {
    fn name(&self) -> &'static str {
        "NormalizeHeaders"
    }

    fn process(&self, context: &PipelineContext, request: &mut RequestDescriptor) -> Result<()> {
        if request.header_str(USER_AGENT).is_none() {
            let agent = HeaderValue::from_str(&context.user_agent).map_err(|e| {
                ClientError::InvalidHeader(format!("user agent {:?}: {}", context.user_agent, e))
            })?;
            request.headers.insert(USER_AGENT, agent);
        }

        let mirrored = match request.header_str(CONTENT_TYPE) {
            Some(ct) if is_json_type(ct) || is_xml_type(ct) => request.headers.get(CONTENT_TYPE).cloned(),
            _ => None,
        };
        if request.header_str(ACCEPT).is_none() {
            if let Some(content_type) = mirrored {
                request.headers.insert(ACCEPT, content_type);
            }
        }

        Ok(())
    }
}

/// Encode multipart fields, form fields or the body, in that order of
/// precedence
pub struct EncodeBody;

impl RequestStage for EncodeBody {
    fn name(&self) -> &'static str {
        "EncodeBody"
    }

    fn process(&self, context: &PipelineContext, request: &mut RequestDescriptor) -> Result<()> {
        if !is_payload_supported(&request.method, context.allow_get_payload) {
            if !request.body.is_empty() || !request.form_data.is_empty() {
                debug!("Not encoding a payload for {} requests", request.method);
            }
            return Ok(());
        }

        if request.multipart && request.method != Method::PATCH {
            return encode_multipart(request);
        }

        if !request.form_data.is_empty() {
            return encode_form(request);
        }

        if !request.body.is_empty() {
            if request.header_str(CONTENT_TYPE).is_none() {
                let detected = detect_content_type(&request.body);
                request
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(detected));
            }
            encode_payload(request)?;
        }

        Ok(())
    }
}

/// Whether a body is sent for the method at all
pub fn is_payload_supported(method: &Method, allow_get_payload: bool) -> bool {
    !(method == Method::HEAD
        || method == Method::OPTIONS
        || (method == Method::GET && !allow_get_payload))
}

fn encode_form(request: &mut RequestDescriptor) -> Result<()> {
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(param_pairs(&request.form_data))
        .finish();

    request
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
    request.encoded_body = Some(Bytes::from(encoded));
    Ok(())
}

fn encode_multipart(request: &mut RequestDescriptor) -> Result<()> {
    let boundary = hex::encode(rand::random::<[u8; 30]>());

    let mut buf = String::new();
    for (name, value) in param_pairs(&request.form_data) {
        buf.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            boundary,
            escape_quotes(name),
            value
        ));
    }
    buf.push_str(&format!("--{}--\r\n", boundary));

    let content_type = format!("multipart/form-data; boundary={}", boundary);
    let content_type = HeaderValue::from_str(&content_type)
        .map_err(|e| ClientError::InvalidHeader(format!("{}: {}", content_type, e)))?;
    request.headers.insert(CONTENT_TYPE, content_type);
    request.encoded_body = Some(Bytes::from(buf));
    Ok(())
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn encode_payload(request: &mut RequestDescriptor) -> Result<()> {
    let content_type = request.header_str(CONTENT_TYPE).unwrap_or_default().to_string();

    let encoded = match std::mem::take(&mut request.body) {
        Body::Empty => return Ok(()),
        Body::Bytes(bytes) => bytes,
        Body::Text(text) => Bytes::from(text),
        Body::Reader(mut reader) => {
            let mut buf = Vec::new();
            reader
                .read_to_end(&mut buf)
                .map_err(|e| ClientError::Encode(format!("reading body: {}", e)))?;
            Bytes::from(buf)
        }
        Body::Object(object) => encode_object(&object, &content_type)?,
    };

    request.encoded_body = Some(encoded);
    Ok(())
}

fn encode_object(object: &ObjectBody, content_type: &str) -> Result<Bytes> {
    match (BodyFormat::from_content_type(content_type), object.shape()) {
        (Some(BodyFormat::Json), _) => object
            .to_json()
            .map(Bytes::from)
            .map_err(|e| ClientError::Encode(format!("json: {}", e))),
        (Some(BodyFormat::Xml), Shape::Record) => object
            .to_xml()
            .map(Bytes::from)
            .map_err(|e| ClientError::Encode(format!("xml: {}", e))),
        (_, shape) => Err(ClientError::UnsupportedBodyType(format!(
            "cannot encode a {:?} body as '{}'",
            shape, content_type
        ))),
    }
}

/// Set `Content-Length` from the encoded body when the caller opted in
pub struct AssignContentLength;

impl RequestStage for AssignContentLength {
    fn name(&self) -> &'static str {
        "AssignContentLength"
    }

    fn process(&self, _context: &PipelineContext, request: &mut RequestDescriptor) -> Result<()> {
        if !request.set_content_length {
            return Ok(());
        }

        if let Some(len) = request.encoded_body.as_ref().map(Bytes::len) {
            request.headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        }
        Ok(())
    }
}

/// Decode the response body into the request's result or error sink
pub struct DecodeBody;

impl ResponseStage for DecodeBody {
    fn name(&self) -> &'static str {
        "DecodeBody"
    }

    fn process(
        &self,
        context: &PipelineContext,
        request: &RequestDescriptor,
        response: &mut Response,
    ) -> Result<()> {
        let content_type = response
            .content_type()
            .map(str::to_string)
            .or_else(|| request.fallback_content_type.clone());
        let Some(format) = content_type.as_deref().and_then(BodyFormat::from_content_type) else {
            return Ok(());
        };

        let status = response.status().as_u16();
        let (sink, is_result) = match status {
            200..=299 => (request.result.as_deref(), true),
            400.. => (request.error.as_deref(), false),
            _ => (None, false),
        };
        let Some(sink) = sink else {
            return Ok(());
        };

        if response.body().is_empty() {
            debug!("Empty {} response body from {}, nothing to decode", status, context.app);
            return Ok(());
        }

        debug!("Decoding {} response from {} into {}", status, context.app, sink.type_name());
        let decoded = sink.decode(format, response.body())?;
        if is_result {
            response.result = Some(decoded);
        } else {
            response.error = Some(decoded);
        }
        Ok(())
    }
}

//! Executed request: status, headers, raw body

use crate::encoding::Encoding;
use crate::error::{NappingError, NappingResult};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Server response with the time the request was sent and its latency
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status_code: u16,

    /// Response headers
    pub headers: HeaderMap,

    /// Response body as bytes
    pub body: Bytes,

    /// Time when the request was sent
    pub timestamp: DateTime<Utc>,

    /// Request latency in milliseconds
    pub latency_ms: u64,

    /// Final URL (may differ from request URL due to redirects)
    pub url: String,

    /// HTTP version
    pub version: String,

    /// Encoding used by `unmarshal`
    pub encoding: Encoding,
}

impl Response {
    /// HTTP status for the executed request
    pub fn status(&self) -> u16 {
        self.status_code
    }

    /// Time when the request was sent
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Check if the body belongs in the error destination (status >= 300)
    pub fn is_error(&self) -> bool {
        self.status_code >= 300
    }

    /// Check if status is redirect (3xx)
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// Body as text with surrounding whitespace trimmed (lossy UTF-8)
    pub fn raw_text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }

    /// Get body as text (UTF-8)
    pub fn text(&self) -> NappingResult<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| NappingError::Decode(format!("Invalid UTF-8 in response: {}", e)))
    }

    /// Decode the body with the session encoding
    pub fn unmarshal<T: DeserializeOwned>(&self) -> NappingResult<T> {
        self.encoding.unmarshal(&self.body)
    }

    /// Get raw bytes
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Whether the server sent no body
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Get latency as Duration
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get content type
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }
}

/// Builder for creating Response values (used by transports and tests)
#[derive(Debug)]
pub struct ResponseBuilder {
    status_code: u16,
    headers: HeaderMap,
    body: Bytes,
    timestamp: DateTime<Utc>,
    latency_ms: u64,
    url: String,
    version: String,
    encoding: Encoding,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self {
            status_code: 200,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            timestamp: Utc::now(),
            latency_ms: 0,
            url: String::new(),
            version: "HTTP/1.1".to_string(),
            encoding: Encoding::Json,
        }
    }

    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = code;
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn latency_ms(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn build(self) -> Response {
        Response {
            status_code: self.status_code,
            headers: self.headers,
            body: self.body,
            timestamp: self.timestamp,
            latency_ms: self.latency_ms,
            url: self.url,
            version: self.version,
            encoding: self.encoding,
        }
    }
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a reqwest Response, reading the whole body
pub(crate) async fn from_reqwest(response: reqwest::Response) -> NappingResult<ResponseBuilder> {
    let status_code = response.status().as_u16();
    let url = response.url().to_string();
    let version = format!("{:?}", response.version());
    let headers = response.headers().clone();

    let body = response.bytes().await?;

    Ok(ResponseBuilder::new()
        .status_code(status_code)
        .headers(headers)
        .body(body)
        .url(url)
        .version(version))
}

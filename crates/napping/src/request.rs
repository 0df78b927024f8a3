//! Request model and composition of the outbound HTTP request

use crate::auth::{ensure_safe_scheme, resolve_credentials};
use crate::config::{Opts, Params};
use crate::encoding::Encoding;
use crate::error::{NappingError, NappingResult};
use crate::method::HttpMethod;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Schemes a session can dial
pub(crate) const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "unix"];

/// Request body
#[derive(Debug, Clone)]
pub enum Payload<P> {
    /// No body
    Empty,
    /// Value marshalled with the session encoding
    Value(P),
    /// Pre-built bytes sent as-is
    Raw(Bytes),
}

/// Where a decoded response body is written.
///
/// `()` means no destination was supplied, so the body is left undecoded.
/// Any `&mut T` with `T: DeserializeOwned` receives the decoded value.
pub trait Destination {
    /// Decode `body` into the destination. Returns whether anything was written.
    fn decode(&mut self, encoding: Encoding, body: &[u8]) -> NappingResult<bool>;
}

impl Destination for () {
    fn decode(&mut self, _encoding: Encoding, _body: &[u8]) -> NappingResult<bool> {
        Ok(false)
    }
}

impl<T: DeserializeOwned> Destination for &mut T {
    fn decode(&mut self, encoding: Encoding, body: &[u8]) -> NappingResult<bool> {
        **self = encoding.unmarshal(body)?;
        Ok(true)
    }
}

/// An HTTP request together with the destinations its response is decoded
/// into.
///
/// A request is sent at most once; afterwards it records when it was sent
/// and the status the server returned.
#[derive(Debug)]
pub struct Request<P = (), R = (), E = ()> {
    /// Raw URL string
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Query parameters, applied to GET requests
    pub params: Params,
    /// Request body
    pub payload: Payload<P>,
    /// Payload must be `Payload::Raw`
    pub raw: bool,
    /// Destination for success bodies (status < 300)
    pub result: R,
    /// Destination for failure bodies (status >= 300)
    pub error: E,
    /// Per-request options, layered over the session defaults
    pub opts: Opts,

    timestamp: Option<DateTime<Utc>>,
    status: Option<u16>,
}

impl Request {
    /// Create a request without payload or destinations
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            params: Params::new(),
            payload: Payload::Empty,
            raw: false,
            result: (),
            error: (),
            opts: Opts::default(),
            timestamp: None,
            status: None,
        }
    }
}

impl<P, R, E> Request<P, R, E> {
    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add multiple query parameters
    pub fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    /// Set a payload marshalled with the session encoding
    pub fn payload<Q>(self, payload: Q) -> Request<Q, R, E> {
        self.with_payload(Payload::Value(payload))
    }

    /// Set a pre-built body and mark the request raw
    pub fn raw_payload(mut self, body: impl Into<Bytes>) -> Self {
        self.payload = Payload::Raw(body.into());
        self.raw = true;
        self
    }

    /// Require the payload to be raw bytes
    pub fn mark_raw(mut self) -> Self {
        self.raw = true;
        self
    }

    /// Set the destination for success bodies
    pub fn result<T: Destination>(self, result: T) -> Request<P, T, E> {
        Request {
            url: self.url,
            method: self.method,
            params: self.params,
            payload: self.payload,
            raw: self.raw,
            result,
            error: self.error,
            opts: self.opts,
            timestamp: self.timestamp,
            status: self.status,
        }
    }

    /// Set the destination for failure bodies
    pub fn error<T: Destination>(self, error: T) -> Request<P, R, T> {
        Request {
            url: self.url,
            method: self.method,
            params: self.params,
            payload: self.payload,
            raw: self.raw,
            result: self.result,
            error,
            opts: self.opts,
            timestamp: self.timestamp,
            status: self.status,
        }
    }

    /// Set per-request options
    pub fn opts(mut self, opts: Opts) -> Self {
        self.opts = opts;
        self
    }

    /// Time the request was sent, `None` until then
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Status returned by the server, `None` until the request was sent
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Whether the request has been sent
    pub fn is_sent(&self) -> bool {
        self.timestamp.is_some()
    }

    pub(crate) fn mark_sent(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = Some(timestamp);
    }

    pub(crate) fn record_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    fn with_payload<Q>(self, payload: Payload<Q>) -> Request<Q, R, E> {
        Request {
            url: self.url,
            method: self.method,
            params: self.params,
            payload,
            raw: self.raw,
            result: self.result,
            error: self.error,
            opts: self.opts,
            timestamp: self.timestamp,
            status: self.status,
        }
    }
}

/// Fully composed outbound request, ready for a transport
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    /// Target URL with the final query string and no user-info
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub expected_status: Option<u16>,
    pub timeout: Option<Duration>,
}

/// Compose the outbound request. Pure: no I/O happens here, so every usage
/// and auth error surfaces before anything is dialed.
pub(crate) fn prepare<P: Serialize, R, E>(
    request: &Request<P, R, E>,
    defaults: &Opts,
    encoding: Encoding,
    allow_unsafe_auth: bool,
) -> NappingResult<PreparedRequest> {
    let mut url = Url::parse(&request.url)?;
    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(NappingError::UnsupportedScheme(url.scheme().to_string()));
    }

    let opts = defaults.merge(&request.opts);

    if request.method == HttpMethod::Get {
        let mut params = opts.params.clone();
        params.extend(request.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        apply_query(&mut url, &params);
    }

    let mut headers = opts.header.clone();

    let body = match &request.payload {
        Payload::Empty => None,
        Payload::Value(_) if request.raw => return Err(NappingError::InvalidRawPayload),
        Payload::Value(value) => Some(Bytes::from(encoding.marshal(value)?)),
        Payload::Raw(bytes) => Some(bytes.clone()),
    };
    if body.is_some() && !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(encoding.content_type()));
    }
    if !headers.contains_key(ACCEPT) {
        headers.insert(ACCEPT, HeaderValue::from_static(encoding.content_type()));
    }

    if let Some(userinfo) = resolve_credentials(opts.userinfo.as_ref(), &url) {
        ensure_safe_scheme(url.scheme(), allow_unsafe_auth)?;
        headers.insert(AUTHORIZATION, userinfo.basic_auth_header()?);
    }
    strip_userinfo(&mut url);

    Ok(PreparedRequest {
        method: request.method,
        url,
        headers,
        body,
        expected_status: opts.expected_status,
        timeout: opts.timeout,
    })
}

/// Merge `params` into the URL query: same-named values are replaced,
/// other existing pairs are kept.
fn apply_query(url: &mut Url, params: &Params) {
    if params.is_empty() {
        return;
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !params.contains_key(k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
}

fn strip_userinfo(url: &mut Url) {
    if url.username().is_empty() && url.password().is_none() {
        return;
    }
    // Only fails for URLs without a host, which cannot carry user-info.
    let _ = url.set_username("");
    let _ = url.set_password(None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Userinfo;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Foo {
        foo: String,
    }

    fn prepare_default<P: Serialize, R, E>(
        request: &Request<P, R, E>,
    ) -> NappingResult<PreparedRequest> {
        prepare(request, &Opts::default(), Encoding::Json, false)
    }

    #[test]
    fn test_get_merges_params_into_query() {
        let request = Request::new(HttpMethod::Get, "http://example.com/api?page=1&sort=asc")
            .param("page", "2")
            .param("q", "a b");
        let prepared = prepare_default(&request).unwrap();

        let pairs: Params = prepared.url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("page").map(String::as_str), Some("2"));
        assert_eq!(pairs.get("sort").map(String::as_str), Some("asc"));
        assert_eq!(pairs.get("q").map(String::as_str), Some("a b"));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_session_params_overridden_by_request() {
        let defaults = Opts::new().param("limit", "10").param("page", "1");
        let request = Request::new(HttpMethod::Get, "http://example.com/").param("page", "3");
        let prepared = prepare(&request, &defaults, Encoding::Json, false).unwrap();

        let pairs: Params = prepared.url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("limit").map(String::as_str), Some("10"));
        assert_eq!(pairs.get("page").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_params_ignored_for_post() {
        let request = Request::new(HttpMethod::Post, "http://example.com/").param("a", "1");
        let prepared = prepare_default(&request).unwrap();
        assert!(prepared.url.query().is_none());
    }

    #[test]
    fn test_payload_encoded_with_content_type() {
        let request = Request::new(HttpMethod::Post, "http://example.com/").payload(Foo {
            foo: "bar".to_string(),
        });
        let prepared = prepare_default(&request).unwrap();

        assert_eq!(prepared.body.unwrap(), Bytes::from_static(br#"{"foo":"bar"}"#));
        assert_eq!(prepared.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(prepared.headers.get(ACCEPT).unwrap(), "application/json");
    }

    #[test]
    fn test_xml_content_type() {
        let request = Request::new(HttpMethod::Put, "http://example.com/").payload(Foo {
            foo: "bar".to_string(),
        });
        let prepared = prepare(&request, &Opts::default(), Encoding::Xml, false).unwrap();
        assert_eq!(prepared.headers.get(CONTENT_TYPE).unwrap(), "application/xml");
        assert_eq!(
            prepared.body.unwrap(),
            Bytes::from_static(b"<Foo><foo>bar</foo></Foo>")
        );
    }

    #[test]
    fn test_raw_payload_rules() {
        let request = Request::new(HttpMethod::Post, "http://example.com/")
            .raw_payload(vec![0u8, 159, 146, 150]);
        let prepared = prepare_default(&request).unwrap();
        assert_eq!(prepared.body.unwrap().as_ref(), &[0u8, 159, 146, 150]);

        let request = Request::new(HttpMethod::Post, "http://example.com/")
            .payload("not bytes")
            .mark_raw();
        assert!(matches!(
            prepare_default(&request),
            Err(NappingError::InvalidRawPayload)
        ));
    }

    #[test]
    fn test_accept_header_not_overwritten() {
        let request = Request::new(HttpMethod::Get, "http://example.com/")
            .opts(Opts::new().try_header("Accept", "text/csv").unwrap());
        let prepared = prepare_default(&request).unwrap();
        assert_eq!(prepared.headers.get(ACCEPT).unwrap(), "text/csv");
    }

    #[test]
    fn test_basic_auth_requires_https() {
        let request = Request::new(HttpMethod::Get, "http://example.com/")
            .opts(Opts::new().userinfo(Userinfo::new("user", "pw")));
        assert!(matches!(
            prepare_default(&request),
            Err(NappingError::UnsafeBasicAuth { .. })
        ));

        let prepared = prepare(&request, &Opts::default(), Encoding::Json, true).unwrap();
        assert!(prepared.headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_url_userinfo_applied_and_stripped() {
        let request = Request::new(HttpMethod::Get, "https://user:pw@example.com/x");
        let prepared = prepare_default(&request).unwrap();
        assert_eq!(
            prepared.headers.get(AUTHORIZATION).unwrap().to_str().unwrap(),
            "Basic dXNlcjpwdw=="
        );
        assert_eq!(prepared.url.as_str(), "https://example.com/x");
    }

    #[test]
    fn test_bad_urls() {
        let request = Request::new(HttpMethod::Get, "bad://url");
        assert!(matches!(
            prepare_default(&request),
            Err(NappingError::UnsupportedScheme(_))
        ));

        let request = Request::new(HttpMethod::Get, "://nope");
        assert!(matches!(
            prepare_default(&request),
            Err(NappingError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_destinations() {
        let mut result = Foo::default();
        let mut dest = &mut result;
        assert!(dest.decode(Encoding::Json, br#"{"foo":"x"}"#).unwrap());
        assert_eq!(result.foo, "x");
        assert!(!().decode(Encoding::Json, b"garbage").unwrap());
    }
}

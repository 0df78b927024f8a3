//! Session: persistent defaults plus a shared transport

use crate::config::{Opts, Params, SessionConfig};
use crate::encoding::Encoding;
use crate::error::{sanitize_error_message, NappingError, NappingResult};
use crate::method::HttpMethod;
use crate::request::{prepare, Destination, Payload, PreparedRequest, Request};
use crate::response::{Response, ResponseBuilder};
use crate::transport::{RoundTrip, TcpTransport};
#[cfg(unix)]
use crate::unix_socket::UnixSocketTransport;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Holds default options and a transport, and executes requests.
///
/// Cloning is cheap and clones share the transport, so one session can
/// serve concurrent calls.
///
/// # Example
///
/// ```ignore
/// use napping::{Opts, Session, SessionConfig};
///
/// #[derive(serde::Deserialize, Default)]
/// struct Repo { name: String }
///
/// #[tokio::main]
/// async fn main() -> napping::NappingResult<()> {
///     let session = Session::new(SessionConfig::new().log(true))?;
///
///     let mut repo = Repo::default();
///     let response = session
///         .get("https://api.github.com/repos/rust-lang/rust", None, &mut repo, (), None)
///         .await?;
///     println!("{} -> {}", response.status(), repo.name);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    transport: Arc<dyn RoundTrip>,
    config: SessionConfig,
}

impl Session {
    /// Create a session; the transport is built here, so configuration
    /// errors surface before any request is made
    pub fn new(config: SessionConfig) -> NappingResult<Self> {
        let transport: Arc<dyn RoundTrip> = match &config.unix_socket {
            #[cfg(unix)]
            Some(path) => Arc::new(
                UnixSocketTransport::new(path.clone())
                    .with_timeouts(config.connect_timeout, config.read_timeout),
            ),
            #[cfg(not(unix))]
            Some(_) => {
                return Err(NappingError::Config(
                    "Unix socket transport requires a Unix platform".to_string(),
                ))
            }
            None => Arc::new(TcpTransport::new(&config)?),
        };
        Ok(Self::with_transport(config, transport))
    }

    /// Create a session over a caller-supplied transport
    pub fn with_transport(config: SessionConfig, transport: Arc<dyn RoundTrip>) -> Self {
        Self {
            inner: Arc::new(SessionInner { transport, config }),
        }
    }

    /// Session with default configuration (JSON, no logging)
    pub fn default_session() -> NappingResult<Self> {
        Self::new(SessionConfig::default())
    }

    /// Configuration the session was built with
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Encoding for payloads and responses
    pub fn encoding(&self) -> Encoding {
        self.inner.config.encoding
    }

    /// Compose, send and decode a request.
    ///
    /// Success bodies (status < 300) go to `request.result`, others to
    /// `request.error`; empty bodies are never decoded. Decode failures are
    /// returned as [`NappingError::Decode`]. A request can only be sent once.
    pub async fn send<P, R, E>(&self, request: &mut Request<P, R, E>) -> NappingResult<Response>
    where
        P: Serialize,
        R: Destination,
        E: Destination,
    {
        let result = self.send_inner(request).await;
        if let Err(err) = &result {
            tracing::debug!(
                "{} {} failed: {}",
                request.method,
                redact_url(&request.url),
                err.sanitized_message()
            );
            if self.inner.config.log {
                tracing::warn!("{}", err.sanitized_message());
            }
        }
        result
    }

    async fn send_inner<P, R, E>(&self, request: &mut Request<P, R, E>) -> NappingResult<Response>
    where
        P: Serialize,
        R: Destination,
        E: Destination,
    {
        if request.is_sent() {
            return Err(NappingError::AlreadySent);
        }
        let config = &self.inner.config;

        let prepared = prepare(
            request,
            &config.defaults,
            config.encoding,
            config.unsafe_basic_auth,
        )?;
        if config.log {
            log_request(&prepared, &request.payload);
        }

        let timestamp = Utc::now();
        request.mark_sent(timestamp);
        let start = Instant::now();

        let exchange = self.exchange(&prepared);
        let builder = match prepared.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| NappingError::Timeout(limit))??,
            None => exchange.await?,
        };

        let response = builder
            .timestamp(timestamp)
            .latency_ms(start.elapsed().as_millis() as u64)
            .encoding(config.encoding)
            .build();
        request.record_status(response.status());
        tracing::debug!(
            "{} {} -> {} in {}ms",
            prepared.method,
            prepared.url,
            response.status(),
            response.latency_ms
        );
        if config.log {
            log_response(&response);
        }

        let decoded = decode_into(&mut request.result, &mut request.error, &response);

        if let Some(expected) = prepared.expected_status {
            if expected != response.status() {
                if let Err(err) = decoded {
                    tracing::debug!("Ignoring decode error on unexpected status: {}", err);
                }
                return Err(NappingError::UnexpectedStatus {
                    expected,
                    response: Box::new(response),
                });
            }
        }
        decoded?;

        Ok(response)
    }

    /// Pick the transport: `unix://` URLs dial the socket embedded in their
    /// path, everything else goes through the session transport.
    async fn exchange(&self, prepared: &PreparedRequest) -> NappingResult<ResponseBuilder> {
        if prepared.url.scheme() == "unix" {
            #[cfg(unix)]
            {
                let config = &self.inner.config;
                let transport = UnixSocketTransport::locate(&prepared.url)
                    .await?
                    .with_timeouts(config.connect_timeout, config.read_timeout);
                tracing::debug!("Dialing socket {}", transport.path().display());
                return transport.round_trip(prepared).await;
            }
            #[cfg(not(unix))]
            return Err(NappingError::UnsupportedScheme("unix".to_string()));
        }
        self.inner.transport.round_trip(prepared).await
    }

    fn request(&self, method: HttpMethod, url: &str, opts: Option<Opts>) -> Request {
        Request::new(method, url).opts(opts.unwrap_or_default())
    }

    // Convenience methods for each HTTP verb

    /// Send a GET request; `params` are merged into the query string
    pub async fn get<R, E>(
        &self,
        url: &str,
        params: Option<&Params>,
        result: R,
        error: E,
        opts: Option<Opts>,
    ) -> NappingResult<Response>
    where
        R: Destination,
        E: Destination,
    {
        let mut request = self
            .request(HttpMethod::Get, url, opts)
            .params(params.cloned().unwrap_or_default())
            .result(result)
            .error(error);
        self.send(&mut request).await
    }

    /// Send a HEAD request
    pub async fn head<R, E>(
        &self,
        url: &str,
        result: R,
        error: E,
        opts: Option<Opts>,
    ) -> NappingResult<Response>
    where
        R: Destination,
        E: Destination,
    {
        let mut request = self
            .request(HttpMethod::Head, url, opts)
            .result(result)
            .error(error);
        self.send(&mut request).await
    }

    /// Send an OPTIONS request
    pub async fn options<R, E>(
        &self,
        url: &str,
        result: R,
        error: E,
        opts: Option<Opts>,
    ) -> NappingResult<Response>
    where
        R: Destination,
        E: Destination,
    {
        let mut request = self
            .request(HttpMethod::Options, url, opts)
            .result(result)
            .error(error);
        self.send(&mut request).await
    }

    /// Send a POST request with an encoded payload
    pub async fn post<P, R, E>(
        &self,
        url: &str,
        payload: &P,
        result: R,
        error: E,
        opts: Option<Opts>,
    ) -> NappingResult<Response>
    where
        P: Serialize + ?Sized,
        R: Destination,
        E: Destination,
    {
        self.send_with_payload(HttpMethod::Post, url, payload, result, error, opts)
            .await
    }

    /// Send a PUT request with an encoded payload
    pub async fn put<P, R, E>(
        &self,
        url: &str,
        payload: &P,
        result: R,
        error: E,
        opts: Option<Opts>,
    ) -> NappingResult<Response>
    where
        P: Serialize + ?Sized,
        R: Destination,
        E: Destination,
    {
        self.send_with_payload(HttpMethod::Put, url, payload, result, error, opts)
            .await
    }

    /// Send a PATCH request with an encoded payload
    pub async fn patch<P, R, E>(
        &self,
        url: &str,
        payload: &P,
        result: R,
        error: E,
        opts: Option<Opts>,
    ) -> NappingResult<Response>
    where
        P: Serialize + ?Sized,
        R: Destination,
        E: Destination,
    {
        self.send_with_payload(HttpMethod::Patch, url, payload, result, error, opts)
            .await
    }

    /// Send a DELETE request
    pub async fn delete<R, E>(
        &self,
        url: &str,
        result: R,
        error: E,
        opts: Option<Opts>,
    ) -> NappingResult<Response>
    where
        R: Destination,
        E: Destination,
    {
        let mut request = self
            .request(HttpMethod::Delete, url, opts)
            .result(result)
            .error(error);
        self.send(&mut request).await
    }

    async fn send_with_payload<P, R, E>(
        &self,
        method: HttpMethod,
        url: &str,
        payload: &P,
        result: R,
        error: E,
        opts: Option<Opts>,
    ) -> NappingResult<Response>
    where
        P: Serialize + ?Sized,
        R: Destination,
        E: Destination,
    {
        let mut request = self
            .request(method, url, opts)
            .payload(payload)
            .result(result)
            .error(error);
        self.send(&mut request).await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.inner.transport.name())
            .field("encoding", &self.inner.config.encoding)
            .field("log", &self.inner.config.log)
            .finish()
    }
}

/// Write a non-empty body into the destination its status selects
fn decode_into<R: Destination, E: Destination>(
    result: &mut R,
    error: &mut E,
    response: &Response,
) -> NappingResult<()> {
    if response.is_empty() {
        return Ok(());
    }
    if response.is_error() {
        error.decode(response.encoding, response.bytes())?;
    } else {
        result.decode(response.encoding, response.bytes())?;
    }
    Ok(())
}

/// Caller URL with any user-info removed
fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => sanitize_error_message(raw),
    }
}

fn log_request<P: Serialize>(prepared: &PreparedRequest, payload: &Payload<P>) {
    let payload = match payload {
        Payload::Empty => "<none>".to_string(),
        Payload::Value(value) => serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("<unprintable: {}>", e)),
        Payload::Raw(bytes) => STANDARD.encode(bytes),
    };
    tracing::info!(
        "REQUEST {} {}\nHeader: {:?}\nPayload: {}",
        prepared.method,
        prepared.url,
        prepared.headers,
        payload
    );
}

fn log_response(response: &Response) {
    let body = if response.is_empty() {
        "Empty response body".to_string()
    } else {
        response.raw_text()
    };
    tracing::info!(
        "RESPONSE {} {} ({}ms)\nHeader: {:?}\nBody: {}",
        response.version,
        response.status(),
        response.latency_ms,
        response.headers,
        body
    );
}

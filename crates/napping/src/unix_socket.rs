//! Unix domain socket transport
//!
//! URLs such as `unix:///var/run/docker.sock/v1.10/images/json` carry two
//! paths: the socket (`/var/run/docker.sock`) and the request path
//! (`/v1.10/images/json`). [`locate_socket`] finds the split by probing the
//! filesystem; [`UnixSocketTransport`] dials the socket for every request.

use crate::error::{NappingError, NappingResult};
use crate::request::PreparedRequest;
use crate::response::ResponseBuilder;
use crate::transport::RoundTrip;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::header::HOST;
use http::HeaderValue;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use std::borrow::Cow;
use std::future::Future;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use url::Url;

/// Whether `path` itself (not a symlink target) is a Unix domain socket
pub async fn is_unix_socket(path: &Path) -> bool {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta.file_type().is_socket(),
        Err(e) => {
            tracing::trace!("{}: {}", path.display(), e);
            false
        }
    }
}

fn decode_segment(segment: &str) -> Cow<'_, str> {
    urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment))
}

/// Split a percent-encoded URL path into (socket path, request path).
///
/// Walks from the full path toward the root and returns at the first prefix
/// that is a socket. Socket segments are percent-decoded before probing the
/// filesystem; the request path stays encoded and always starts with `/`.
pub async fn locate_socket(raw_path: &str) -> NappingResult<(PathBuf, String)> {
    let segments: Vec<&str> = raw_path.split('/').filter(|s| !s.is_empty()).collect();
    let decoded: Vec<Cow<'_, str>> = segments.iter().map(|s| decode_segment(s)).collect();

    for split in (1..=segments.len()).rev() {
        let candidate = PathBuf::from(format!("/{}", decoded[..split].join("/")));
        if is_unix_socket(&candidate).await {
            let rest = format!("/{}", segments[split..].join("/"));
            return Ok((candidate, rest));
        }
    }

    Err(NappingError::SocketNotFound(PathBuf::from(format!(
        "/{}",
        decoded.join("/")
    ))))
}

/// Filesystem path embedded in a `unix://` URL. A host component is the
/// first path segment: `unix://var/run/x.sock` names `/var/run/x.sock`.
pub fn socket_url_path(url: &Url) -> String {
    match url.host_str() {
        Some(host) if !host.is_empty() => format!("/{}{}", host, url.path()),
        _ => url.path().to_string(),
    }
}

/// Dials a Unix domain socket for each request; connections are not reused
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    path: PathBuf,
    /// Request path when the URL embeds the socket path
    request_path: Option<String>,
    connect_timeout: Option<Duration>,
    /// Applies to the response head and to each body frame
    read_timeout: Option<Duration>,
}

impl UnixSocketTransport {
    /// Send every request to the socket at `path`, using the URL's own path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            request_path: None,
            connect_timeout: None,
            read_timeout: None,
        }
    }

    /// Resolve the socket embedded in a `unix://` URL
    pub async fn locate(url: &Url) -> NappingResult<Self> {
        let (path, request_path) = locate_socket(&socket_url_path(url)).await?;
        Ok(Self {
            request_path: Some(request_path),
            ..Self::new(path)
        })
    }

    /// Bound dialing and reading, as `SessionConfig::connect_timeout` and
    /// `SessionConfig::read_timeout` do on the TCP transport
    pub fn with_timeouts(mut self, connect: Option<Duration>, read: Option<Duration>) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Socket path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn target(&self, url: &Url) -> String {
        let path = self.request_path.as_deref().unwrap_or_else(|| url.path());
        match url.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        }
    }
}

async fn within<F: Future>(limit: Option<Duration>, fut: F) -> NappingResult<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| NappingError::Timeout(limit)),
        None => Ok(fut.await),
    }
}

#[async_trait]
impl RoundTrip for UnixSocketTransport {
    async fn round_trip(&self, request: &PreparedRequest) -> NappingResult<ResponseBuilder> {
        let stream = within(self.connect_timeout, UnixStream::connect(&self.path)).await??;
        let (mut sender, connection) =
            hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;

        let socket = self.path.clone();
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::debug!("Connection to {} closed: {:?}", socket.display(), err);
            }
        });

        let target = self.target(&request.url);
        let mut builder = http::Request::builder()
            .method(http::Method::from(request.method))
            .uri(target.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers.clone());
            if !headers.contains_key(HOST) {
                let host = match request.url.host_str() {
                    Some(host) if request.url.scheme() != "unix" && !host.is_empty() => {
                        HeaderValue::from_str(host)
                            .unwrap_or_else(|_| HeaderValue::from_static("localhost"))
                    }
                    _ => HeaderValue::from_static("localhost"),
                };
                headers.insert(HOST, host);
            }
        }
        let body = Full::new(request.body.clone().unwrap_or_else(Bytes::new));
        let outbound = builder
            .body(body)
            .map_err(|e| NappingError::InvalidHeader(e.to_string()))?;

        let response = within(self.read_timeout, sender.send_request(outbound)).await??;
        let (parts, mut incoming) = response.into_parts();
        let mut body = BytesMut::new();
        while let Some(frame) = within(self.read_timeout, incoming.frame()).await? {
            if let Ok(data) = frame?.into_data() {
                body.extend_from_slice(&data);
            }
        }

        Ok(ResponseBuilder::new()
            .status_code(parts.status.as_u16())
            .headers(parts.headers)
            .body(body.freeze())
            .url(format!("unix://{}{}", self.path.display(), target))
            .version(format!("{:?}", parts.version)))
    }

    fn name(&self) -> &'static str {
        "unix"
    }
}

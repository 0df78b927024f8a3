//! Transports: how a prepared request reaches the server

use crate::config::SessionConfig;
use crate::error::{NappingError, NappingResult};
use crate::request::PreparedRequest;
use crate::response::{from_reqwest, ResponseBuilder};
use async_trait::async_trait;

/// Sends one prepared request and reads the whole response.
///
/// Implementations must be safe to share between concurrent calls.
#[async_trait]
pub trait RoundTrip: Send + Sync {
    /// Execute the request
    async fn round_trip(&self, request: &PreparedRequest) -> NappingResult<ResponseBuilder>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// TCP transport backed by a pooled reqwest client
#[derive(Debug, Clone)]
pub struct TcpTransport {
    client: reqwest::Client,
}

impl TcpTransport {
    /// Build the reqwest client from the session configuration
    pub fn new(config: &SessionConfig) -> NappingResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.read_timeout {
            builder = builder.read_timeout(timeout);
        }

        if config.follow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }

        let client = builder
            .build()
            .map_err(|e| NappingError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RoundTrip for TcpTransport {
    async fn round_trip(&self, request: &PreparedRequest) -> NappingResult<ResponseBuilder> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url.clone())
            .headers(request.headers.clone());

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        from_reqwest(response).await
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

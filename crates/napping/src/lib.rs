//! napping: async client for RESTful APIs
//!
//! Composes a request (URL, query parameters, encoded payload, Basic auth),
//! sends it, and decodes the response into caller-supplied result or error
//! destinations.
//!
//! # Architecture
//!
//! - `Session`: default options plus a shared transport; executes requests
//! - `Request`: one outbound request and its destinations, sent once
//! - `Response`: status, headers, raw body, send timestamp
//! - `Opts` / `SessionConfig`: layered per-call options and construction-time settings
//! - `Encoding`: JSON or XML bodies
//! - Transports: TCP via reqwest, Unix domain sockets via hyper
//!
//! Free functions (`get`, `post`, ...) run a single call on a fresh default
//! session.

pub mod api;
pub mod auth;
pub mod config;
pub mod encoding;
pub mod error;
pub mod method;
pub mod request;
pub mod response;
pub mod session;
pub mod transport;
#[cfg(unix)]
pub mod unix_socket;

pub use api::{delete, get, head, options, patch, post, put, send};
pub use auth::Userinfo;
pub use config::{Opts, Params, SessionConfig};
pub use encoding::Encoding;
pub use error::{ErrorCategory, NappingError, NappingResult};
pub use method::HttpMethod;
pub use request::{Destination, Payload, PreparedRequest, Request};
pub use response::{Response, ResponseBuilder};
pub use session::Session;
pub use transport::{RoundTrip, TcpTransport};
#[cfg(unix)]
pub use unix_socket::{locate_socket, UnixSocketTransport};

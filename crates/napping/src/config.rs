//! Session configuration and layered per-call options

use crate::auth::Userinfo;
use crate::encoding::Encoding;
use crate::error::{NappingError, NappingResult};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// URL query parameters, one value per key
pub type Params = BTreeMap<String, String>;

/// Overridable request settings.
///
/// A session holds one `Opts` as defaults; each call may pass another one.
/// The effective settings are `defaults.merge(&call)`.
#[derive(Debug, Clone, Default)]
pub struct Opts {
    /// Credentials for HTTP Basic authentication
    pub userinfo: Option<Userinfo>,

    /// Headers to send (merged key-wise, later layers overwrite)
    pub header: HeaderMap,

    /// Query parameters for GET requests (merged key-wise)
    pub params: Params,

    /// Status the server must return; anything else is `UnexpectedStatus`
    pub expected_status: Option<u16>,

    /// Deadline for the whole call
    pub timeout: Option<Duration>,
}

impl Opts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer `other` over `self`: set fields of `other` win, header and
    /// param maps merge key by key.
    pub fn merge(&self, other: &Opts) -> Opts {
        let mut merged = self.clone();

        if other.userinfo.is_some() {
            merged.userinfo = other.userinfo.clone();
        }

        for name in other.header.keys() {
            merged.header.remove(name);
            for value in other.header.get_all(name) {
                merged.header.append(name.clone(), value.clone());
            }
        }

        merged
            .params
            .extend(other.params.iter().map(|(k, v)| (k.clone(), v.clone())));

        if other.expected_status.is_some() {
            merged.expected_status = other.expected_status;
        }
        if other.timeout.is_some() {
            merged.timeout = other.timeout;
        }

        merged
    }

    /// Set credentials
    pub fn userinfo(mut self, userinfo: Userinfo) -> Self {
        self.userinfo = Some(userinfo);
        self
    }

    /// Set username and password
    pub fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.userinfo(Userinfo::new(username, password))
    }

    /// Set a header, replacing earlier values for the same name
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.header.insert(name, value);
        self
    }

    /// Set a header from strings
    pub fn try_header(self, name: &str, value: &str) -> NappingResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| NappingError::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| NappingError::InvalidHeader(format!("{}: {}", name, e)))?;
        Ok(self.header(name, value))
    }

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

    /// Require a status code
    pub fn expected_status(mut self, status: u16) -> Self {
        self.expected_status = Some(status);
        self
    }

    /// Bound the whole call
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Construction-time settings for a [`Session`](crate::Session)
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Encoding for payloads and responses
    pub encoding: Encoding,

    /// Log requests and responses through `tracing`
    pub log: bool,

    /// Allow Basic auth over plain HTTP
    pub unsafe_basic_auth: bool,

    /// Defaults layered under every call's options
    pub defaults: Opts,

    /// Total request timeout on the TCP transport
    pub timeout: Option<Duration>,

    /// Connection timeout
    pub connect_timeout: Option<Duration>,

    /// Read timeout (per read, after the connection is established)
    pub read_timeout: Option<Duration>,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// Maximum number of redirects to follow
    pub max_redirects: usize,

    /// User-Agent header value
    pub user_agent: String,

    /// Dial this Unix socket for every request instead of TCP
    pub unix_socket: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Json,
            log: false,
            unsafe_basic_auth: false,
            defaults: Opts::default(),
            timeout: None,
            connect_timeout: None,
            read_timeout: None,
            follow_redirects: true,
            max_redirects: 10,
            user_agent: format!("napping/{}", env!("CARGO_PKG_VERSION")),
            unix_socket: None,
        }
    }
}

impl SessionConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the encoding
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Enable/disable request and response logging
    pub fn log(mut self, enabled: bool) -> Self {
        self.log = enabled;
        self
    }

    /// Allow Basic auth over plain HTTP
    pub fn unsafe_basic_auth(mut self, allow: bool) -> Self {
        self.unsafe_basic_auth = allow;
        self
    }

    /// Set the default options
    pub fn defaults(mut self, defaults: Opts) -> Self {
        self.defaults = defaults;
        self
    }

    /// Set the total timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set whether to follow redirects
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Set maximum redirects
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Route every request through a Unix domain socket
    pub fn unix_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.unix_socket = Some(path.into());
        self
    }
}

//! Top-level verb functions.
//!
//! Each call builds a fresh default session (JSON, no logging, no shared
//! state between calls) and delegates to it. Use a [`Session`] directly to
//! keep defaults, credentials or a connection pool across calls.

use crate::config::{Opts, Params};
use crate::error::NappingResult;
use crate::request::{Destination, Request};
use crate::response::Response;
use crate::session::Session;
use serde::Serialize;

/// Send a request built by hand
pub async fn send<P, R, E>(request: &mut Request<P, R, E>) -> NappingResult<Response>
where
    P: Serialize,
    R: Destination,
    E: Destination,
{
    Session::default_session()?.send(request).await
}

/// Send a GET request
pub async fn get<R: Destination, E: Destination>(
    url: &str,
    params: Option<&Params>,
    result: R,
    error: E,
    opts: Option<Opts>,
) -> NappingResult<Response> {
    Session::default_session()?
        .get(url, params, result, error, opts)
        .await
}

/// Send a HEAD request
pub async fn head<R: Destination, E: Destination>(
    url: &str,
    result: R,
    error: E,
    opts: Option<Opts>,
) -> NappingResult<Response> {
    Session::default_session()?
        .head(url, result, error, opts)
        .await
}

/// Send an OPTIONS request
pub async fn options<R: Destination, E: Destination>(
    url: &str,
    result: R,
    error: E,
    opts: Option<Opts>,
) -> NappingResult<Response> {
    Session::default_session()?
        .options(url, result, error, opts)
        .await
}

/// Send a POST request
pub async fn post<P, R, E>(
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
    Session::default_session()?
        .post(url, payload, result, error, opts)
        .await
}

/// Send a PUT request
pub async fn put<P, R, E>(
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
    Session::default_session()?
        .put(url, payload, result, error, opts)
        .await
}

/// Send a PATCH request
pub async fn patch<P, R, E>(
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
    Session::default_session()?
        .patch(url, payload, result, error, opts)
        .await
}

/// Send a DELETE request
pub async fn delete<R: Destination, E: Destination>(
    url: &str,
    result: R,
    error: E,
    opts: Option<Opts>,
) -> NappingResult<Response> {
    Session::default_session()?
        .delete(url, result, error, opts)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NappingError;

    #[tokio::test]
    async fn test_bad_scheme_is_an_error() {
        let err = get("bad://url", None, (), (), None).await.unwrap_err();
        assert!(matches!(err, NappingError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn test_unparseable_url_is_an_error() {
        let err = delete("http://[::1", (), (), None).await.unwrap_err();
        assert!(matches!(err, NappingError::InvalidUrl(_)));
    }
}

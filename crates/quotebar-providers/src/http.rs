//! Shared HTTP plumbing.

use quotebar_core::error::{ConfigError, FetchError};
use reqwest::{header, Client, Response, StatusCode};
use std::time::Duration;

const USER_AGENT: &str = concat!("quotebar/", env!("CARGO_PKG_VERSION"));

/// Build a client with the given default headers.
pub(crate) fn build_client(headers: &[(header::HeaderName, &str)]) -> Result<Client, ConfigError> {
    let mut map = header::HeaderMap::new();
    for (name, value) in headers {
        let value = header::HeaderValue::from_str(value).map_err(|e| ConfigError::Invalid {
            field: "http header",
            reason: format!("{}: {}", name, e),
        })?;
        map.insert(name.clone(), value);
    }

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(map)
        .build()
        .map_err(|e| ConfigError::Load(format!("HTTP client: {}", e)))
}

/// Map a transport error, keeping timeouts distinct.
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else if err.is_decode() {
        FetchError::Parse(err.to_string())
    } else {
        FetchError::Network(err.to_string())
    }
}

/// Turn a non-success status into an error.
pub(crate) async fn check_status(resp: Response, what: &str) -> Result<Response, FetchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(what.to_string()));
    }
    let text = resp.text().await.unwrap_or_default();
    Err(FetchError::Network(format!("{}: {}", status, text.trim())))
}

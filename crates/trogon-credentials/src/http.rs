//! Shared plumbing for the reqwest-based admin API clients.

use std::time::Duration;

use reqwest::{Client, Response};
use url::Url;

use crate::error::{ClientError, EngineError};

pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub(crate) fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, EngineError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {e}")))
}

/// Parse a base URL, rejecting anything that cannot carry path segments.
pub(crate) fn parse_base(raw: &str) -> Result<Url, EngineError> {
    let url = Url::parse(raw).map_err(|e| EngineError::InvalidUri(format!("{raw:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(EngineError::InvalidUri(format!("{raw:?}: not a base URL")));
    }
    Ok(url)
}

/// Append percent-encoded path segments to `base`.
///
/// Each segment is encoded on its own, so a RabbitMQ vhost of `/` becomes `%2F`.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::Url(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Turn a non-2xx response into [`ClientError::Api`].
pub(crate) async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = error_body(resp.text().await);
    Err(ClientError::Api {
        status: status.as_u16(),
        body,
    })
}

fn error_body(text: Result<String, reqwest::Error>) -> String {
    text.unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}

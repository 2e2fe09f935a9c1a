//! HTTP plumbing shared by the Calendar and Gmail clients.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// User agent sent with every request.
const USER_AGENT: &str = concat!("gbrief/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client used for OAuth and API calls.
pub fn http_client(timeout: Duration) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| {
            ProviderError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
        })
}

/// Maps a transport failure to a network error.
pub(crate) fn send_error(e: reqwest::Error) -> ProviderError {
    let message = if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        format!("request failed: {}", e)
    };
    ProviderError::network(message).with_source(e)
}

/// Google's JSON error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Builds an error from a non-success status and its response body.
///
/// Uses the message from Google's `{"error": {...}}` envelope when the body
/// carries one, and the raw body otherwise.
pub fn status_error(status: u16, body: &str) -> ProviderError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match (envelope.error.message, envelope.error.status) {
            (Some(message), Some(status)) => format!("{} ({})", message, status),
            (Some(message), None) => message,
            (None, Some(status)) => status,
            (None, None) => "unknown error".to_string(),
        },
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    };
    ProviderError::from_status(status, message)
}

/// Reads a response body, failing on non-success statuses, and parses it as JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> ProviderResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(|e| {
        ProviderError::network(format!("failed to read response: {}", e)).with_source(e)
    })?;

    if !status.is_success() {
        debug!("API returned {}: {}", status, body);
        return Err(status_error(status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse response: {}", e)).with_source(e)
    })
}

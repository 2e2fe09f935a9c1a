//! Command drivers shared by the two binaries.

pub mod calendar;
pub mod gmail;

use std::io::Write;

use gbrief_google::{
    CredentialLoader, FileCredentialStore, OAuthClient, ProviderError, ProviderResult,
};
use tracing::warn;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Exit status for configuration and authentication failures.
pub const EXIT_FATAL: u8 = 1;

/// Exit status for reported API errors when `fail_on_api_error` is set.
pub const EXIT_API_ERROR: u8 = 2;

/// How a command run ended, short of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The listing (or its empty notice) was printed.
    Completed,
    /// The API failed and the error was printed instead.
    ApiFailed,
}

impl Outcome {
    /// Returns the process exit status for this outcome.
    pub fn exit_status(self, fail_on_api_error: bool) -> u8 {
        match self {
            Self::ApiFailed if fail_on_api_error => EXIT_API_ERROR,
            _ => 0,
        }
    }
}

/// An authenticated HTTP client.
#[derive(Debug, Clone)]
pub struct Session {
    pub http: reqwest::Client,
    pub access_token: String,
}

/// Loads or obtains a credential for `scopes` using the configured files.
pub async fn connect(config: &ClientConfig, scopes: &[String]) -> ClientResult<Session> {
    let http = gbrief_google::http_client(config.http.timeout())?;

    let authorizer = OAuthClient::new(&config.auth.credentials_path, http.clone())
        .with_port_range(config.auth.callback_port_range)
        .with_open_browser(config.auth.open_browser);
    let loader = CredentialLoader::new(
        FileCredentialStore::new(&config.auth.token_path),
        authorizer,
    );

    let credential = loader.obtain(scopes).await?;
    let access_token = credential
        .access_token()
        .ok_or_else(|| ProviderError::authentication("credential has no access token"))?
        .to_string();

    Ok(Session { http, access_token })
}

/// Unwraps a provider result, printing a recoverable API error to `out` as
/// `"{context}: {error}"`. Fatal errors are passed through.
pub(crate) fn report<T, W: Write>(
    out: &mut W,
    result: ProviderResult<T>,
    context: &str,
) -> ClientResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if !e.is_fatal() => {
            warn!("{}: {}", context, e);
            writeln!(out, "{}: {}", context, e)?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

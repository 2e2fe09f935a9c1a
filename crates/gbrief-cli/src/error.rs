//! Client error types.

use gbrief_google::ProviderError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the command-line tools.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration file or flag problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential loading or API failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// IO error, typically writing to stdout.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing JSON output failed.
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns true if the error ends the run with a failure status.
    ///
    /// API errors are reported in the listing's place and are not fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_fatal(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_are_not_fatal() {
        let err = ClientError::from(ProviderError::from_status(404, "Not Found"));
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "not_found (HTTP 404): Not Found");
    }

    #[test]
    fn configuration_errors_are_fatal() {
        assert!(ClientError::Config("bad".into()).is_fatal());
        assert!(ClientError::from(ProviderError::configuration("missing")).is_fatal());
        assert!(ClientError::from(ProviderError::authentication("denied")).is_fatal());
    }
}

//! Error types for Google credential and API operations.
//!
//! Every failure carries a [`ProviderErrorCode`], and every code belongs to
//! one of three [`ErrorCategory`] values that decide how the tools react:
//! configuration and authentication failures are fatal, API failures are
//! reported and the run ends normally.

use std::fmt;
use thiserror::Error;

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or invalid local files; raised before any network call.
    Configuration,
    /// Consent or token refresh failed.
    Authentication,
    /// The provider rejected or failed a request.
    Api,
}

impl ErrorCategory {
    /// Returns true if the run cannot continue past this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Api)
    }
}

/// The kind of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Configuration error - missing or invalid client secret / token file.
    ConfigurationError,
    /// Consent was declined, or a token exchange/refresh failed.
    AuthenticationFailed,
    /// The API rejected the access token (401).
    Unauthorized,
    /// The API denied access to the resource (403).
    Forbidden,
    /// Resource not found (404).
    NotFound,
    /// Request was invalid (400).
    BadRequest,
    /// Rate limit exceeded (429).
    RateLimited,
    /// Server returned an error (5xx status codes).
    ServerError,
    /// Network error - connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Invalid response from the server - parse error, unexpected format.
    InvalidResponse,
    /// Unexpected internal state.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns the category this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigurationError => ErrorCategory::Configuration,
            Self::AuthenticationFailed => ErrorCategory::Authentication,
            _ => ErrorCategory::Api,
        }
    }

    /// Returns a machine-friendly name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::AuthenticationFailed => "authentication_failed",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::NetworkError => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::InternalError => "internal_error",
        }
    }

    /// Maps an HTTP error status to a code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::InvalidResponse,
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while authenticating or calling a Google API.
#[derive(Debug, Error)]
pub struct ProviderError {
    /// The error code categorizing this error.
    code: ProviderErrorCode,
    /// A human-readable message describing the error.
    message: String,
    /// HTTP status returned by the provider, if any.
    status: Option<u16>,
    /// The service that generated this error (e.g., "calendar", "gmail", "oauth").
    provider: Option<String>,
    /// The underlying cause of this error, if any.
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            provider: None,
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Creates an error from an HTTP error status and the provider's message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(ProviderErrorCode::from_status(status), message);
        err.status = Some(status);
        err
    }

    /// Sets the service name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error category.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the provider answered with one.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the service name, if set.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Returns true if the run cannot continue past this error.
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}", self.code)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

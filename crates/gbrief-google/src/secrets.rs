//! OAuth client secret (`credentials.json`) loading.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// Default Google authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Default Google token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// The OAuth client registered in Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecret {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// Authorization endpoint.
    pub auth_uri: String,
    /// Token endpoint.
    pub token_uri: String,
}

/// Structure of Google's OAuth client secret JSON file.
///
/// Supports multiple formats:
/// 1. Google Cloud Console format with "installed" or "web" section
/// 2. Flat format with client_id and client_secret at root level (e.g., from gcloud)
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<NestedSecret>,
    web: Option<NestedSecret>,
    client_id: Option<String>,
    client_secret: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedSecret {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl ClientSecret {
    /// Creates a client secret using Google's default endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: GOOGLE_AUTH_URL.to_string(),
            token_uri: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Loads the client secret downloaded from Google Cloud Console.
    ///
    /// A missing or malformed file is a configuration error.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ProviderError::configuration(format!(
                "client secret file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read client secret file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;

        Self::from_json(&content)
    }

    /// Parses a client secret JSON document.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse client secret JSON: {}", e))
        })?;

        let secret = if let Some(nested) = file.installed.or(file.web) {
            let mut secret = Self::new(nested.client_id, nested.client_secret);
            if let Some(auth_uri) = nested.auth_uri {
                secret.auth_uri = auth_uri;
            }
            if let Some(token_uri) = nested.token_uri {
                secret.token_uri = token_uri;
            }
            secret
        } else if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret)
        {
            let mut secret = Self::new(client_id, client_secret);
            if let Some(token_uri) = file.token_uri {
                secret.token_uri = token_uri;
            }
            secret
        } else {
            return Err(ProviderError::configuration(
                "client secret file must contain an 'installed'/'web' section or 'client_id'/'client_secret' at root level",
            ));
        };

        secret.validate()?;
        Ok(secret)
    }

    /// Checks that the client id and secret look like Google-issued values.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.client_id.is_empty() {
            return Err(ProviderError::configuration("client_id is required"));
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err(ProviderError::configuration(
                "client_id should end with .apps.googleusercontent.com",
            ));
        }
        if self.client_secret.is_empty() {
            return Err(ProviderError::configuration("client_secret is required"));
        }
        Ok(())
    }
}

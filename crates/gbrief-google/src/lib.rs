//! Google OAuth credential loading plus Calendar and Gmail API clients.
//!
//! ```text
//!  credentials.json ──┐
//!                     ▼
//!  token.json ──► CredentialLoader ──► Credential ──┬──► GoogleCalendarClient ──► CalendarEvent
//!                 (store + OAuthClient)             └──► GmailClient ──────────► EmailMessage
//! ```
//!
//! # Example
//!
//! ```ignore
//! use gbrief_google::{CredentialLoader, FileCredentialStore, OAuthClient, scopes};
//!
//! let http = gbrief_google::http_client(Duration::from_secs(30))?;
//! let loader = CredentialLoader::new(
//!     FileCredentialStore::new("token.json"),
//!     OAuthClient::new("credentials.json", http.clone()),
//! );
//! let credential = loader.obtain(&scopes::gmail_defaults()).await?;
//! ```

pub mod api;
pub mod calendar;
pub mod error;
pub mod gmail;
pub mod loader;
pub mod oauth;
pub mod provider;
pub mod scopes;
pub mod secrets;
pub mod tokens;

// Re-export main types at crate root
pub use api::http_client;
pub use calendar::GoogleCalendarClient;
pub use error::{ErrorCategory, ProviderError, ProviderErrorCode, ProviderResult};
pub use gmail::{GmailClient, today_query};
pub use loader::CredentialLoader;
pub use oauth::{OAuthClient, PkceFlow};
pub use provider::{Authorizer, BoxFuture, CalendarSource, MailSource};
pub use secrets::ClientSecret;
pub use tokens::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};

//! Async seams between the command drivers and Google.
//!
//! The command drivers only see these traits, so tests can swap in
//! in-memory sources and authorizers without a network.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use gbrief_core::{CalendarEvent, EmailMessage};

use crate::error::ProviderResult;
use crate::tokens::Credential;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can list upcoming calendar events.
pub trait CalendarSource: Send + Sync {
    /// Returns up to `max_results` events starting at or after `time_min`,
    /// ordered by start time, with recurring events expanded.
    fn upcoming_events(
        &self,
        time_min: DateTime<Utc>,
        max_results: u32,
    ) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>>;
}

/// Something that can search a mailbox and fetch message headers.
pub trait MailSource: Send + Sync {
    /// Returns the ids of every message matching a search query.
    fn list_message_ids<'a>(&'a self, query: &'a str)
    -> BoxFuture<'a, ProviderResult<Vec<String>>>;

    /// Fetches the `From`, `Subject` and `Date` headers of one message.
    fn get_message<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ProviderResult<EmailMessage>>;
}

/// The network-facing half of credential loading.
pub trait Authorizer: Send + Sync {
    /// Exchanges the credential's refresh token for a new access token.
    fn refresh<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, ProviderResult<Credential>>;

    /// Runs the interactive consent flow for `scopes`.
    fn authorize<'a>(&'a self, scopes: &'a [String]) -> BoxFuture<'a, ProviderResult<Credential>>;
}

//! Email message records.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder used when the `From` or `Date` header is missing, and when no
/// sender domain can be derived.
pub const UNKNOWN: &str = "Unknown";

/// Placeholder used when the `Subject` header is missing.
pub const NO_SUBJECT: &str = "No Subject";

/// Matches everything after the first `@` up to the next `>` (or the end).
static SENDER_DOMAIN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([^>]+)").expect("Invalid sender domain regex"));

/// The headers of a single Gmail message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Gmail message identifier.
    pub id: String,
    /// Raw `From` header.
    pub sender: String,
    /// Raw `Subject` header.
    pub subject: String,
    /// Raw `Date` header.
    pub date: String,
}

impl EmailMessage {
    /// Builds a message from optional header values, applying the
    /// placeholders for anything missing.
    pub fn from_headers(
        id: impl Into<String>,
        sender: Option<String>,
        subject: Option<String>,
        date: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.unwrap_or_else(|| UNKNOWN.to_string()),
            subject: subject.unwrap_or_else(|| NO_SUBJECT.to_string()),
            date: date.unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }

    /// Returns the domain part of the sender address.
    pub fn sender_domain(&self) -> &str {
        sender_domain(&self.sender)
    }
}

/// Extracts the domain from a `From` header value.
///
/// Returns [`UNKNOWN`] when the header has no `@`.
pub fn sender_domain(from: &str) -> &str {
    SENDER_DOMAIN_REGEX
        .captures(from)
        .and_then(|caps| caps.get(1))
        .map_or(UNKNOWN, |m| m.as_str())
}

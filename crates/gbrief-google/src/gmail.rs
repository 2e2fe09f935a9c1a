//! Gmail API v1 client.

use chrono::NaiveDate;
use gbrief_core::EmailMessage;
use serde::Deserialize;
use tracing::debug;

use crate::api::{read_json, send_error};
use crate::error::ProviderResult;
use crate::provider::{BoxFuture, MailSource};

/// Base URL for Gmail API v1.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Headers fetched for each message.
const METADATA_HEADERS: [&str; 3] = ["From", "Subject", "Date"];

/// Formats a date the way Gmail search expects it (`YYYY/MM/DD`).
pub fn query_date(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

/// Search query for messages received on or after `date`.
pub fn today_query(date: NaiveDate) -> String {
    format!("after:{}", query_date(date))
}

/// Gmail API client for the authenticated user's mailbox.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http_client: reqwest::Client,
    access_token: String,
}

impl GmailClient {
    pub fn new(http_client: reqwest::Client, access_token: impl Into<String>) -> Self {
        Self {
            http_client,
            access_token: access_token.into(),
        }
    }

    /// Lists the ids of all messages matching `query`, following pagination.
    pub async fn list_message_ids(&self, query: &str) -> ProviderResult<Vec<String>> {
        let url = format!("{}/users/me/messages", GMAIL_API_BASE);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http_client
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&[("q", query)]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| send_error(e).with_provider("gmail"))?;
            let page: MessageListResponse = read_json(response)
                .await
                .map_err(|e| e.with_provider("gmail"))?;

            ids.extend(page.messages.into_iter().map(|m| m.id));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("query {:?} matched {} messages", query, ids.len());
        Ok(ids)
    }

    /// Fetches the `From`, `Subject` and `Date` headers of one message.
    pub async fn get_message(&self, id: &str) -> ProviderResult<EmailMessage> {
        let url = format!(
            "{}/users/me/messages/{}",
            GMAIL_API_BASE,
            urlencoding::encode(id)
        );

        let mut params = vec![("format", "metadata")];
        params.extend(METADATA_HEADERS.iter().map(|h| ("metadataHeaders", *h)));

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&params)
            .send()
            .await
            .map_err(|e| send_error(e).with_provider("gmail"))?;
        let message: ApiMessage = read_json(response)
            .await
            .map_err(|e| e.with_provider("gmail"))?;

        Ok(message.into_email(id))
    }
}

impl MailSource for GmailClient {
    fn list_message_ids<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<String>>> {
        Box::pin(GmailClient::list_message_ids(self, query))
    }

    fn get_message<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ProviderResult<EmailMessage>> {
        Box::pin(GmailClient::get_message(self, id))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    id: Option<String>,
    #[serde(default)]
    payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagePart {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

impl ApiMessage {
    fn into_email(self, requested_id: &str) -> EmailMessage {
        let headers = self.payload.unwrap_or_default().headers;
        EmailMessage::from_headers(
            self.id.unwrap_or_else(|| requested_id.to_string()),
            header_value(&headers, "From"),
            header_value(&headers, "Subject"),
            header_value(&headers, "Date"),
        )
    }
}

/// Returns the first header named `name`, ignoring ASCII case.
fn header_value(headers: &[Header], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

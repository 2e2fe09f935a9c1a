//! Output formatting for event and message listings.
//!
//! This module turns fetched records into the text printed by the command-line
//! tools:
//! - **Event time lines**: one line describing when an event happens, using the
//!   local timezone (or any timezone, for tests)
//! - **Listings**: numbered multi-line blocks for events and messages
//! - **JSON**: machine-readable documents for both listings
//!
//! # Example
//!
//! ```rust
//! use chrono::{FixedOffset, NaiveDate};
//! use gbrief_core::format::EventFormatter;
//! use gbrief_core::EventTime;
//!
//! let formatter = EventFormatter::new(FixedOffset::east_opt(0).unwrap());
//! let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
//! let line = formatter.event_time(
//!     &EventTime::from_date(day),
//!     &EventTime::from_date(day.succ_opt().unwrap()),
//! );
//! assert_eq!(line, "All day Fri, Mar 15, 2024");
//! ```

use std::borrow::Cow;
use std::fmt::{self, Write as _};

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::event::CalendarEvent;
use crate::message::EmailMessage;
use crate::time::EventTime;


/// Notice printed instead of a listing when the calendar has nothing upcoming.
pub const NO_EVENTS_NOTICE: &str = "No upcoming events found.";

const DATE_FORMAT: &str = "%a, %b %d";
const DATE_WITH_YEAR_FORMAT: &str = "%a, %b %d, %Y";
const TIME_FORMAT: &str = "%I:%M %p";
const MESSAGE_RULE_WIDTH: usize = 60;

/// The output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Formats calendar events relative to a timezone.
#[derive(Debug, Clone)]
pub struct EventFormatter<Tz: TimeZone> {
    tz: Tz,
}

impl EventFormatter<Local> {
    /// Creates a formatter for the system's local timezone.
    pub fn local() -> Self {
        Self::new(Local)
    }
}

impl<Tz> EventFormatter<Tz>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    /// Creates a formatter that renders times in `tz`.
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Formats the "when" line of an event.
    ///
    /// All-day events spanning at most one day render a single date; longer
    /// ones render a date range. Timed events render in the formatter's
    /// timezone, collapsing the date when start and end share a local day.
    pub fn event_time(&self, start: &EventTime, end: &EventTime) -> String {
        if let EventTime::AllDay(start_date) = start {
            let end_date = end.date_in(&self.tz);
            let days = end_date.signed_duration_since(*start_date).num_days();

            return if days <= 1 {
                format!("All day {}", start_date.format(DATE_WITH_YEAR_FORMAT))
            } else {
                format!(
                    "All day {} - {}",
                    start_date.format(DATE_FORMAT),
                    end_date.format(DATE_WITH_YEAR_FORMAT)
                )
            };
        }

        let start_local = start.datetime_in(&self.tz);
        let end_local = end.datetime_in(&self.tz);

        if start_local.date_naive() == end_local.date_naive() {
            format!(
                "{}, {} - {}",
                start_local.format(DATE_WITH_YEAR_FORMAT),
                start_local.format(TIME_FORMAT),
                end_local.format(TIME_FORMAT)
            )
        } else {
            format!(
                "{}, {} - {}, {}",
                start_local.format(DATE_FORMAT),
                start_local.format(TIME_FORMAT),
                end_local.format(DATE_FORMAT),
                end_local.format(TIME_FORMAT)
            )
        }
    }

    /// Formats one numbered event block, including its trailing blank line.
    pub fn event_block(&self, index: usize, event: &CalendarEvent) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}. {}", index, event.summary);
        let _ = writeln!(out, "   {}", self.event_time(&event.start, &event.end));

        if let Some(ref location) = event.location {
            let _ = writeln!(out, "   📍 {}", location);
        }

        if let Some(desc) = event.description_preview() {
            let _ = writeln!(out, "   📝 {}", desc);
        }

        out.push('\n');
        out
    }

    /// Formats the full text listing: heading followed by every event block.
    ///
    /// Callers print [`NO_EVENTS_NOTICE`] instead when `events` is empty.
    pub fn event_listing(&self, events: &[CalendarEvent]) -> String {
        let mut out = String::from("\nYOUR UPCOMING EVENTS:\n=====================\n");
        for (i, event) in events.iter().enumerate() {
            out.push_str(&self.event_block(i + 1, event));
        }
        out
    }

    /// Builds the JSON document for an event listing.
    pub fn event_json(&self, events: &[CalendarEvent]) -> JsonEventListing {
        let events: Vec<JsonEvent> = events
            .iter()
            .map(|event| JsonEvent {
                summary: event.summary.clone(),
                when: self.event_time(&event.start, &event.end),
                start: event.start.to_string(),
                end: event.end.to_string(),
                all_day: event.is_all_day(),
                location: event.location.clone(),
                description: event.description_preview(),
            })
            .collect();

        JsonEventListing {
            count: events.len(),
            events,
        }
    }
}

/// JSON output for the calendar listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonEventListing {
    /// The formatted events.
    pub events: Vec<JsonEvent>,
    /// Number of events returned.
    pub count: usize,
}

/// A single event in JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonEvent {
    pub summary: String,
    /// The same line shown in text output.
    pub when: String,
    pub start: String,
    pub end: String,
    pub all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Notice printed when no message arrived on `date`.
pub fn no_messages_notice(date: &str) -> String {
    format!("No messages found for {}.", date)
}

/// Formats one numbered message block, preceded by a blank line.
pub fn message_block(index: usize, message: &EmailMessage) -> String {
    format!(
        "\n{}. {}\n   From: {}\n   Domain: {}\n   Date: {}\n",
        index,
        message.subject,
        message.sender,
        message.sender_domain(),
        message.date
    )
}

/// Formats the heading of a message listing.
pub fn message_heading(count: usize, date: &str) -> String {
    format!(
        "Found {} messages from today ({}):\n{}\n",
        count,
        date,
        "=".repeat(MESSAGE_RULE_WIDTH)
    )
}

/// Builds the JSON document for a message listing.
pub fn message_json(date: &str, messages: &[EmailMessage]) -> JsonMessageListing {
    let messages: Vec<JsonMessage> = messages
        .iter()
        .map(|m| JsonMessage {
            id: m.id.clone(),
            subject: m.subject.clone(),
            from: m.sender.clone(),
            domain: m.sender_domain().to_string(),
            date: m.date.clone(),
        })
        .collect();

    JsonMessageListing {
        date: date.to_string(),
        count: messages.len(),
        messages,
    }
}

/// JSON output for the Gmail listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonMessageListing {
    /// The `YYYY/MM/DD` date used in the search query.
    pub date: String,
    pub messages: Vec<JsonMessage>,
    pub count: usize,
}

/// A single message in JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonMessage {
    pub id: String,
    pub subject: String,
    pub from: String,
    pub domain: String,
    pub date: String,
}

/// Truncates a string to `max_len` characters, ending with `...` when cut.
pub fn ellipsis(s: &str, max_len: usize) -> Cow<'_, str> {
    if max_len == 0 {
        return Cow::Borrowed("");
    }

    if s.chars().count() <= max_len {
        return Cow::Borrowed(s);
    }

    let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
    Cow::Owned(format!("{}...", truncated))
}

//! Calendar event records.

use serde::{Deserialize, Serialize};

use crate::time::EventTime;

/// Title shown for events that have no summary.
pub const UNTITLED_EVENT: &str = "(No title)";

/// Descriptions longer than this many characters are truncated.
pub const DESCRIPTION_PREVIEW_LIMIT: usize = 50;

/// An upcoming calendar event as returned by the provider.
///
/// Events are read-only once fetched; everything shown to the user is
/// derived from these fields at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Provider event identifier.
    pub id: String,
    /// Event title.
    pub summary: String,
    /// Start of the event.
    pub start: EventTime,
    /// End of the event.
    pub end: EventTime,
    /// Free-form location, if set.
    pub location: Option<String>,
    /// Free-form description, if set.
    pub description: Option<String>,
}

impl CalendarEvent {
    /// Creates a new event with the required fields.
    pub fn new(
        id: impl Into<String>,
        summary: impl Into<String>,
        start: EventTime,
        end: EventTime,
    ) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            start,
            end,
            location: None,
            description: None,
        }
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns `true` if the event is specified by date only.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// Returns the trimmed description shortened for a listing.
    ///
    /// Blank descriptions yield `None`. Anything over
    /// [`DESCRIPTION_PREVIEW_LIMIT`] characters keeps its first 47 characters
    /// followed by `...`.
    pub fn description_preview(&self) -> Option<String> {
        let desc = self.description.as_deref()?.trim();
        if desc.is_empty() {
            return None;
        }
        Some(crate::format::ellipsis(desc, DESCRIPTION_PREVIEW_LIMIT).into_owned())
    }
}

//! Google Calendar API v3 client.

use chrono::{DateTime, SecondsFormat, Utc};
use gbrief_core::event::UNTITLED_EVENT;
use gbrief_core::{CalendarEvent, EventTime};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{read_json, send_error};
use crate::error::ProviderResult;
use crate::provider::{BoxFuture, CalendarSource};

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Calendar queried when none is configured.
pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    access_token: String,
    calendar_id: String,
}

impl GoogleCalendarClient {
    /// Creates a client for the primary calendar.
    pub fn new(http_client: reqwest::Client, access_token: impl Into<String>) -> Self {
        Self {
            http_client,
            access_token: access_token.into(),
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
        }
    }

    /// Selects a calendar other than `primary`.
    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    /// Lists up to `max_results` events starting from `time_min`.
    ///
    /// Recurring events come back as individual instances, ordered by start
    /// time. Cancelled events and events whose times cannot be parsed are
    /// dropped.
    pub async fn list_upcoming(
        &self,
        time_min: DateTime<Utc>,
        max_results: u32,
    ) -> ProviderResult<Vec<CalendarEvent>> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(&self.calendar_id)
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&list_query(time_min, max_results))
            .send()
            .await
            .map_err(|e| send_error(e).with_provider("calendar"))?;

        let list: EventListResponse = read_json(response)
            .await
            .map_err(|e| e.with_provider("calendar"))?;

        let events: Vec<CalendarEvent> = list.items.into_iter().filter_map(convert_event).collect();
        debug!(
            "fetched {} events from calendar {}",
            events.len(),
            self.calendar_id
        );
        Ok(events)
    }
}

impl CalendarSource for GoogleCalendarClient {
    fn upcoming_events(
        &self,
        time_min: DateTime<Utc>,
        max_results: u32,
    ) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>> {
        Box::pin(self.list_upcoming(time_min, max_results))
    }
}

/// Query parameters for the event-list endpoint.
fn list_query(time_min: DateTime<Utc>, max_results: u32) -> [(&'static str, String); 4] {
    [
        (
            "timeMin",
            time_min.to_rfc3339_opts(SecondsFormat::Micros, true),
        ),
        ("maxResults", max_results.to_string()),
        ("singleEvents", "true".to_string()),
        ("orderBy", "startTime".to_string()),
    ]
}

/// Converts an API event, or returns `None` if it should not be shown.
fn convert_event(event: ApiEvent) -> Option<CalendarEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let id = event.id.unwrap_or_default();
    let start = parse_time(&id, "start", &event.start)?;
    let end = parse_time(&id, "end", &event.end)?;

    let summary = event.summary.unwrap_or_else(|| UNTITLED_EVENT.to_string());

    let mut converted = CalendarEvent::new(id, summary, start, end);
    if let Some(location) = event.location {
        converted = converted.with_location(location);
    }
    if let Some(description) = event.description {
        converted = converted.with_description(description);
    }
    Some(converted)
}

fn parse_time(id: &str, field: &str, time: &ApiEventTime) -> Option<EventTime> {
    let raw = match (&time.date_time, &time.date) {
        (Some(dt), _) => dt,
        (None, Some(date)) => date,
        (None, None) => {
            warn!("event {} has no {} time, skipping", id, field);
            return None;
        }
    };
    EventTime::parse(raw)
        .map_err(|e| warn!("event {} has an invalid {} time, skipping: {}", id, field, e))
        .ok()
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

/// Event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    #[serde(default)]
    end: ApiEventTime,
}

/// Event time from the API: `dateTime` for timed events, `date` for all-day ones.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: Option<String>,
    date: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;

    fn events_from(json: &str) -> Vec<CalendarEvent> {
        let list: EventListResponse = serde_json::from_str(json).unwrap();
        list.items.into_iter().filter_map(convert_event).collect()
    }

    #[test]
    fn list_query_parameters() {
        let time_min = Utc.with_ymd_and_hms(2024, 3, 15, 14, 5, 9).unwrap();
        let query = list_query(time_min, 10);

        assert_eq!(query[0], ("timeMin", "2024-03-15T14:05:09.000000Z".to_string()));
        assert_eq!(query[1], ("maxResults", "10".to_string()));
        assert_eq!(query[2], ("singleEvents", "true".to_string()));
        assert_eq!(query[3], ("orderBy", "startTime".to_string()));
    }

    #[test]
    fn converts_timed_and_all_day_events() {
        let events = events_from(
            r#"{
                "kind": "calendar#events",
                "items": [
                    {
                        "id": "a",
                        "status": "confirmed",
                        "summary": "Standup",
                        "location": "Room 1",
                        "description": "Daily sync",
                        "start": {"dateTime": "2024-03-15T09:00:00-04:00", "timeZone": "America/New_York"},
                        "end": {"dateTime": "2024-03-15T09:15:00-04:00"}
                    },
                    {
                        "id": "b",
                        "summary": "Holiday",
                        "start": {"date": "2024-03-18"},
                        "end": {"date": "2024-03-19"}
                    }
                ]
            }"#,
        );

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].summary, "Standup");
        assert_eq!(
            events[0].start,
            EventTime::from_utc(Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap())
        );
        assert_eq!(events[0].location.as_deref(), Some("Room 1"));
        assert_eq!(events[0].description.as_deref(), Some("Daily sync"));

        assert!(events[1].is_all_day());
        assert_eq!(
            events[1].start,
            EventTime::from_date(NaiveDate::from_ymd_opt(2024, 3, 18).unwrap())
        );
        assert!(events[1].location.is_none());
    }

    #[test]
    fn missing_summary_gets_placeholder() {
        let events = events_from(
            r#"{"items": [
                {"id": "a", "start": {"date": "2024-03-18"}, "end": {"date": "2024-03-19"}},
                {"id": "b", "summary": "  ", "start": {"date": "2024-03-18"}, "end": {"date": "2024-03-19"}}
            ]}"#,
        );
        assert_eq!(events[0].summary, UNTITLED_EVENT);
        assert_eq!(events[1].summary, "  ");
    }

    #[test]
    fn skips_cancelled_and_unparseable_events() {
        let events = events_from(
            r#"{"items": [
                {"id": "cancelled", "status": "cancelled", "start": {"date": "2024-03-18"}, "end": {"date": "2024-03-19"}},
                {"id": "bad", "summary": "Bad", "start": {"dateTime": "yesterday"}, "end": {"dateTime": "today"}},
                {"id": "missing", "summary": "Missing"},
                {"id": "ok", "summary": "Ok", "start": {"date": "2024-03-18"}, "end": {"date": "2024-03-19"}}
            ]}"#,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "ok");
    }

    #[test]
    fn empty_response_has_no_items() {
        assert!(events_from(r#"{"kind": "calendar#events"}"#).is_empty());
    }
}

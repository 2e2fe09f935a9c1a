//! Time types for calendar events.
//!
//! Calendar API start/end fields come in two shapes: a date-only string for
//! all-day events (`2024-03-15`) and an RFC 3339 date-time with an offset
//! (`2024-03-15T10:00:00-04:00` or `...Z`). [`EventTime`] models both.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Error returned when a start/end field matches neither supported shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid event time {value:?}: {reason}")]
pub struct TimeParseError {
    value: String,
    reason: String,
}

/// Represents the start or end of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a UTC datetime.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }

    /// Creates a new `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Parses a provider start/end string.
    ///
    /// A value without a time component (no `T`) is an all-day date.
    pub fn parse(value: &str) -> Result<Self, TimeParseError> {
        let value = value.trim();
        let err = |reason: String| TimeParseError {
            value: value.to_string(),
            reason,
        };

        if value.contains('T') {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| Self::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| err(e.to_string()))
        } else {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(Self::AllDay)
                .map_err(|e| err(e.to_string()))
        }
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns the calendar date of this time as seen in `tz`.
    pub fn date_in<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.with_timezone(tz).date_naive(),
            Self::AllDay(date) => *date,
        }
    }

    /// Returns this time as a datetime in `tz`.
    ///
    /// All-day dates map to local midnight; if midnight does not exist in
    /// `tz` (DST gap) UTC midnight is used instead.
    pub fn datetime_in<Tz: TimeZone>(&self, tz: &Tz) -> DateTime<Tz> {
        match self {
            Self::DateTime(dt) => dt.with_timezone(tz),
            Self::AllDay(date) => {
                let midnight = date.and_time(NaiveTime::MIN);
                tz.from_local_datetime(&midnight)
                    .earliest()
                    .unwrap_or_else(|| midnight.and_utc().with_timezone(tz))
            }
        }
    }

    /// Converts to a UTC datetime for ordering.
    ///
    /// All-day events compare at midnight UTC.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_time(NaiveTime::MIN).and_utc(),
        }
    }
}

impl fmt::Display for EventTime {
    /// Writes the provider wire shape: `YYYY-MM-DD` or RFC 3339 in UTC.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::AllDay(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn parse_date_only() {
        let t = EventTime::parse("2024-03-15").unwrap();
        assert_eq!(
            t,
            EventTime::AllDay(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert!(t.is_all_day());
    }

    #[test]
    fn parse_zulu_datetime() {
        let t = EventTime::parse("2024-03-15T10:00:00Z").unwrap();
        assert_eq!(
            t,
            EventTime::DateTime(Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn parse_offset_datetime_normalizes_to_utc() {
        let t = EventTime::parse("2024-03-15T10:00:00-04:00").unwrap();
        assert_eq!(
            t.to_utc_datetime(),
            Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap()
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(EventTime::parse("tomorrow").is_err());
        assert!(EventTime::parse("2024-03-15T25:00").is_err());
    }

    #[test]
    fn date_in_timezone() {
        let t = EventTime::parse("2024-03-15T23:30:00Z").unwrap();
        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(t.date_in(&east), NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
        assert_eq!(t.date_in(&utc), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }

    #[test]
    fn all_day_datetime_is_local_midnight() {
        let t = EventTime::parse("2024-03-15").unwrap();
        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        let dt = t.datetime_in(&west);
        assert_eq!(dt.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(dt.time(), NaiveTime::MIN);
    }

    #[test]
    fn display_uses_wire_shapes() {
        assert_eq!(EventTime::parse("2024-03-15").unwrap().to_string(), "2024-03-15");
        assert_eq!(
            EventTime::parse("2024-03-15T10:00:00-04:00").unwrap().to_string(),
            "2024-03-15T14:00:00Z"
        );
    }

    #[test]
    fn ordering_uses_utc_instant() {
        let a = EventTime::parse("2024-03-15T10:00:00+02:00").unwrap();
        let b = EventTime::parse("2024-03-15T09:00:00Z").unwrap();
        assert!(a < b);
    }
}

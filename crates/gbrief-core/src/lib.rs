//! Core types: events, messages, time formatting, listings

pub mod event;
pub mod format;
pub mod message;
pub mod time;
pub mod tracing;

pub use event::CalendarEvent;
pub use format::{
    EventFormatter, JsonEvent, JsonEventListing, JsonMessage, JsonMessageListing,
    NO_EVENTS_NOTICE, OutputFormat, ellipsis,
};
pub use message::{EmailMessage, sender_domain};
pub use time::{EventTime, TimeParseError};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

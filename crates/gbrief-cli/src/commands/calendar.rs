//! `gcalendar`: list upcoming events.

use std::fmt::Display;
use std::io::Write;

use chrono::{DateTime, TimeZone, Utc};
use gbrief_core::{EventFormatter, NO_EVENTS_NOTICE, OutputFormat};
use gbrief_google::{CalendarSource, GoogleCalendarClient};
use tracing::debug;

use super::{Outcome, connect, report};
use crate::cli::CalendarCli;
use crate::error::ClientResult;

/// Runs `gcalendar` end to end and returns the exit status.
pub async fn execute(cli: CalendarCli) -> ClientResult<u8> {
    let config = cli.common.load_config()?;
    let session = connect(&config, &config.calendar.scopes).await?;
    let client = GoogleCalendarClient::new(session.http, session.access_token)
        .with_calendar_id(config.calendar.calendar_id.as_str());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = list_events(
        &client,
        &EventFormatter::local(),
        cli.event_count(&config),
        Utc::now(),
        cli.common.output_format(),
        &mut out,
    )
    .await?;
    out.flush()?;

    Ok(outcome.exit_status(config.fail_on_api_error))
}

/// Fetches up to `count` events starting at `now` and prints them to `out`.
pub async fn list_events<S, Tz, W>(
    source: &S,
    formatter: &EventFormatter<Tz>,
    count: u32,
    now: DateTime<Utc>,
    format: OutputFormat,
    out: &mut W,
) -> ClientResult<Outcome>
where
    S: CalendarSource + ?Sized,
    Tz: TimeZone,
    Tz::Offset: Display,
    W: Write,
{
    if format == OutputFormat::Text {
        writeln!(out, "Fetching your upcoming {} events...", count)?;
    }

    let result = source.upcoming_events(now, count).await;
    let Some(events) = report(out, result, "Error fetching events")? else {
        return Ok(Outcome::ApiFailed);
    };
    debug!("rendering {} events", events.len());

    match format {
        OutputFormat::Text if events.is_empty() => writeln!(out, "{}", NO_EVENTS_NOTICE)?,
        OutputFormat::Text => write!(out, "{}", formatter.event_listing(&events))?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &formatter.event_json(&events))?;
            writeln!(out)?;
        }
    }

    Ok(Outcome::Completed)
}

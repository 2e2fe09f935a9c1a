//! `gmail-today`: list the messages received today.

use std::io::Write;

use chrono::{Local, NaiveDate};
use gbrief_core::format::{message_block, message_heading, message_json, no_messages_notice};
use gbrief_core::{EmailMessage, OutputFormat};
use gbrief_google::gmail::query_date;
use gbrief_google::{GmailClient, MailSource, ProviderResult, today_query};
use tracing::debug;

use super::{Outcome, connect, report};
use crate::cli::GmailCli;
use crate::error::ClientResult;

/// Runs `gmail-today` end to end and returns the exit status.
pub async fn execute(cli: GmailCli) -> ClientResult<u8> {
    let config = cli.common.load_config()?;
    let session = connect(&config, &config.gmail.scopes).await?;
    let client = GmailClient::new(session.http, session.access_token);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = list_today(
        &client,
        Local::now().date_naive(),
        cli.common.output_format(),
        &mut out,
    )
    .await?;
    out.flush()?;

    Ok(outcome.exit_status(config.fail_on_api_error))
}

/// Prints every message received on or after `today`.
///
/// In text mode each block is written as soon as its headers arrive, so a
/// failed fetch leaves the blocks before it on `out` ahead of the error.
pub async fn list_today<S, W>(
    source: &S,
    today: NaiveDate,
    format: OutputFormat,
    out: &mut W,
) -> ClientResult<Outcome>
where
    S: MailSource + ?Sized,
    W: Write,
{
    let date = query_date(today);

    let result = source.list_message_ids(&today_query(today)).await;
    let Some(ids) = report(out, result, "Error fetching emails")? else {
        return Ok(Outcome::ApiFailed);
    };
    debug!("fetching headers for {} messages", ids.len());

    match format {
        OutputFormat::Text if ids.is_empty() => writeln!(out, "{}", no_messages_notice(&date))?,
        OutputFormat::Text => {
            write!(out, "{}", message_heading(ids.len(), &date))?;
            for (i, id) in ids.iter().enumerate() {
                let result = source.get_message(id).await;
                let Some(message) = report(out, result, "Error fetching emails")? else {
                    return Ok(Outcome::ApiFailed);
                };
                write!(out, "{}", message_block(i + 1, &message))?;
            }
        }
        OutputFormat::Json => {
            let result = fetch_messages(source, &ids).await;
            let Some(messages) = report(out, result, "Error fetching emails")? else {
                return Ok(Outcome::ApiFailed);
            };
            serde_json::to_writer_pretty(&mut *out, &message_json(&date, &messages))?;
            writeln!(out)?;
        }
    }

    Ok(Outcome::Completed)
}

/// Fetches each message's headers in turn, stopping at the first failure.
async fn fetch_messages<S>(source: &S, ids: &[String]) -> ProviderResult<Vec<EmailMessage>>
where
    S: MailSource + ?Sized,
{
    let mut messages = Vec::with_capacity(ids.len());
    for id in ids {
        messages.push(source.get_message(id).await?);
    }
    Ok(messages)
}

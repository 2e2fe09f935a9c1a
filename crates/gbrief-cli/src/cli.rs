//! Command-line interface definitions for both binaries.

use std::path::PathBuf;

use clap::{Args, Parser};
use gbrief_core::{OutputFormat, TracingConfig};

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Options shared by `gcalendar` and `gmail-today`.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Path to configuration file
    #[arg(long, short, env = "GBRIEF_CONFIG")]
    pub config: Option<PathBuf>,

    /// OAuth client secret file
    #[arg(long, value_name = "PATH")]
    pub credentials: Option<PathBuf>,

    /// Cached token file
    #[arg(long, value_name = "PATH")]
    pub token: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Exit with status 2 when the API reports an error
    #[arg(long)]
    pub fail_on_api_error: bool,

    /// Print the consent URL without opening a browser
    #[arg(long)]
    pub no_browser: bool,
}

impl CommonArgs {
    /// Returns the output format based on CLI flags.
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }

    /// Returns the tracing setup for these flags.
    pub fn tracing_config(&self) -> TracingConfig {
        if self.debug {
            TracingConfig::cli_debug()
        } else {
            TracingConfig::default()
        }
    }

    /// Loads the config file (explicit path or default) and applies flag overrides.
    pub fn load_config(&self) -> ClientResult<ClientConfig> {
        let config = match self.config {
            Some(ref path) => ClientConfig::load_from(path)?,
            None => ClientConfig::load()?,
        };
        Ok(self.apply(config))
    }

    /// Applies flag overrides on top of a loaded config.
    pub fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(ref path) = self.credentials {
            config.auth.credentials_path = path.clone();
        }
        if let Some(ref path) = self.token {
            config.auth.token_path = path.clone();
        }
        if self.no_browser {
            config.auth.open_browser = false;
        }
        if self.fail_on_api_error {
            config.fail_on_api_error = true;
        }
        config
    }
}

/// gcalendar - List your upcoming Google Calendar events
#[derive(Debug, Parser)]
#[command(name = "gcalendar")]
#[command(author, version, about, long_about = None)]
pub struct CalendarCli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Number of events to display [default: 10]
    #[arg(long, short = 'n', value_parser = clap::value_parser!(u32).range(1..))]
    pub events: Option<u32>,
}

impl CalendarCli {
    /// Number of events to list: the flag, else the config value.
    pub fn event_count(&self, config: &ClientConfig) -> u32 {
        self.events.unwrap_or(config.calendar.events)
    }
}

/// gmail-today - List the messages you received today
#[derive(Debug, Parser)]
#[command(name = "gmail-today")]
#[command(author, version, about, long_about = None)]
pub struct GmailCli {
    #[command(flatten)]
    pub common: CommonArgs,
}

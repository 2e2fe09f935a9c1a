//! CLI parsing, configuration and command drivers for `gcalendar` and
//! `gmail-today`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{CalendarCli, CommonArgs, GmailCli};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};

//! gcalendar entry point.

use std::process::ExitCode;

use clap::Parser;

use gbrief_cli::CalendarCli;
use gbrief_cli::commands::{EXIT_FATAL, calendar};
use gbrief_core::init_tracing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = CalendarCli::parse();

    if let Err(e) = init_tracing(cli.common.tracing_config()) {
        eprintln!("warning: {}", e);
    }

    match calendar::execute(cli).await {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

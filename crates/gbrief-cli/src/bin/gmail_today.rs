//! gmail-today entry point.

use std::process::ExitCode;

use clap::Parser;

use gbrief_cli::GmailCli;
use gbrief_cli::commands::{EXIT_FATAL, gmail};
use gbrief_core::init_tracing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = GmailCli::parse();

    if let Err(e) = init_tracing(cli.common.tracing_config()) {
        eprintln!("warning: {}", e);
    }

    match gmail::execute(cli).await {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

//! treestash - cache and restore git source trees in S3
//!
//! CLI entry point; also the binary run by the GitHub Action.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use treestash::cli::Cli;
use treestash::output::report_failure;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Action logs are the only output, so info is on by default
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match treestash::cli::execute(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

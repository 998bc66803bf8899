use clap::Parser;
use std::process::ExitCode;

use linkcode::cli::Cli;

const LOG_ENV: &str = "LINKCODE_LOG";

/// Logs go to stderr so they never mix with command or JSON output.
fn init_logger() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();

    let cli = Cli::parse();

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

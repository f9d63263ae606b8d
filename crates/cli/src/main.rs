//! # Ouster Driver CLI
//!
//! Command-line host for the lifecycle driver.
//!
//! Provides:
//! - Parameter loading and validation
//! - Driver lifecycle from configure to shutdown
//! - Signal handling (Ctrl+C / SIGTERM stop, SIGHUP reloads and resets)

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_driver, run_metadata, run_validate};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Ouster driver starting");

    let result = match &cli.command {
        Commands::Run(args) => run_driver(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Metadata(args) => run_metadata(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let fatal = error::is_fatal(&e);
            tracing::error!(error = %format!("{e:#}"), fatal, "Command failed");
            eprintln!("Error: {e:#}");
            error::exit_code(&e)
        }
    }
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let log_format = match cli.log_format {
        cli::LogFormat::Json => observability::LogFormat::Json,
        cli::LogFormat::Pretty => observability::LogFormat::Pretty,
        cli::LogFormat::Compact => observability::LogFormat::Compact,
    };

    observability::init_with_config(observability::ObservabilityConfig {
        log_format,
        // The run command installs the exporter itself
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
        filter_override: cli.quiet.then(|| "warn".to_string()),
    })
}

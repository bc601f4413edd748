//! # carla-utils CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Config loading and validation
//! - Session runs: connect, spawn actors, sync stepping, telemetry proxies
//! - Graceful shutdown

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use observability::ObservabilityConfig;
use tracing::{error, info};

use cli::{Cli, Commands};
use commands::{run_info, run_session, run_validate};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: cli.metrics_port,
        default_log_level: cli.log_level().to_string(),
    }) {
        eprintln!("Failed to initialize observability: {e:#}");
        return ExitCode::FAILURE;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "carla-utils starting");

    let result = match &cli.command {
        Commands::Run(args) => run_session(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, exit_code = e.exit_code(), "Command failed");
            ExitCode::from(e.exit_code())
        }
    }
}

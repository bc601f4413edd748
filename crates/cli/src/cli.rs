//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// carla-utils - run CARLA sessions described by a config file
#[derive(Parser, Debug)]
#[command(
    name = "carla-utils",
    author,
    version,
    about = "Connect to CARLA, spawn actors, drive the simulation clock and relay telemetry",
    long_about = "Connects to a CARLA server, spawns the configured actor tree, optionally takes over \n\
                  the simulation clock in synchronous mode and relays sensor / vehicle data \n\
                  to external processes over UDP."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CARLA_UTILS_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CARLA_UTILS_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true, env = "CARLA_UTILS_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log level from -v / -q
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect, spawn actors, run until stopped, then tear down
    Run(RunArgs),

    /// Validate configuration file without connecting
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "CARLA_UTILS_CONFIG")]
    pub config: PathBuf,

    /// Override CARLA server host from configuration
    #[arg(long, env = "CARLA_HOST")]
    pub host: Option<String>,

    /// Override CARLA server port from configuration
    #[arg(long, env = "CARLA_PORT")]
    pub port: Option<u16>,

    /// Stop after this many seconds (0 = until Ctrl-C)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Stop after this many simulation ticks (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub max_ticks: u64,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "carla-utils",
            "-vv",
            "run",
            "-c",
            "session.toml",
            "--port",
            "2010",
            "--max-ticks",
            "100",
        ])
        .unwrap();

        assert_eq!(cli.log_level(), "trace");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("session.toml"));
                assert_eq!(args.port, Some(2010));
                assert_eq!(args.max_ticks, 100);
                assert_eq!(args.duration, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["carla-utils", "-q", "-v", "info"]).is_err());

        let cli = Cli::try_parse_from(["carla-utils", "-q", "info", "--json"]).unwrap();
        assert_eq!(cli.log_level(), "warn");
    }
}

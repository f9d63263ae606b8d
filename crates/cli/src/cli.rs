//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Ouster OS-1 driver host
#[derive(Parser, Debug)]
#[command(
    name = "ouster-driver",
    author,
    version,
    about = "Ouster OS-1 lidar driver",
    long_about = "Lifecycle-managed driver for the Ouster OS-1 lidar.\n\n\
                  Handshakes with the sensor, assembles UDP column packets into \n\
                  frames, and publishes images, point clouds and IMU samples to \n\
                  the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "OUSTER_DRIVER_VERBOSE")]
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
        env = "OUSTER_DRIVER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure, activate and stream until interrupted
    Run(RunArgs),

    /// Validate a parameter file without touching the sensor
    Validate(ValidateArgs),

    /// Handshake once and print the sensor metadata as JSON
    Metadata(MetadataArgs),
}

/// Parameter file, overrides and sensor selection shared by `run` and `metadata`
#[derive(Args, Debug, Clone)]
pub struct SensorArgs {
    /// Path to parameter file (TOML or JSON); defaults are used when absent
    #[arg(short, long, env = "OUSTER_DRIVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override sensor address
    #[arg(long, env = "OUSTER_LIDAR_IP")]
    pub lidar_ip: Option<String>,

    /// Override the address the sensor streams to
    #[arg(long, env = "OUSTER_COMPUTER_IP")]
    pub computer_ip: Option<String>,

    /// Override lidar mode (e.g. 512x10, 1024x20)
    #[arg(long, env = "OUSTER_LIDAR_MODE")]
    pub lidar_mode: Option<String>,

    /// Use a simulated sensor instead of the network
    #[arg(long)]
    pub simulate: bool,

    /// Beam count of the simulated sensor
    #[arg(long, default_value = "64", requires = "simulate")]
    pub beams: usize,
}

/// Arguments for the `run` command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub sensor: SensorArgs,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "OUSTER_DRIVER_DURATION")]
    pub duration: u64,

    /// Seconds between statistics log lines (0 = disabled)
    #[arg(long, default_value = "10", env = "OUSTER_DRIVER_STATS_INTERVAL")]
    pub stats_interval: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "OUSTER_DRIVER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to parameter file to validate
    #[arg(short, long, default_value = "ouster.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `metadata` command
#[derive(Args, Debug)]
pub struct MetadataArgs {
    #[command(flatten)]
    pub sensor: SensorArgs,

    /// Write the JSON to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_overrides_parse() {
        let cli = Cli::try_parse_from([
            "ouster-driver",
            "run",
            "--lidar-ip",
            "10.5.5.86",
            "--computer-ip",
            "10.5.5.1",
            "--lidar-mode",
            "1024x10",
            "--duration",
            "5",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.sensor.lidar_ip.as_deref(), Some("10.5.5.86"));
        assert_eq!(args.sensor.lidar_mode.as_deref(), Some("1024x10"));
        assert_eq!(args.duration, 5);
        assert!(!args.sensor.simulate);
    }

    #[test]
    fn test_beams_requires_simulate() {
        let result = Cli::try_parse_from(["ouster-driver", "metadata", "--beams", "16"]);
        assert!(result.is_err());

        let cli =
            Cli::try_parse_from(["ouster-driver", "metadata", "--simulate", "--beams", "16"]).unwrap();
        let Commands::Metadata(args) = cli.command else {
            panic!("expected metadata");
        };
        assert_eq!(args.sensor.beams, 16);
    }
}

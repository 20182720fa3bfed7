//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CARLA Capture - LiDAR and camera dataset capture for CARLA simulator
#[derive(Parser, Debug)]
#[command(
    name = "carla-capture",
    author,
    version,
    about = "Capture LiDAR point clouds and camera images from CARLA",
    long_about = "Connects to CARLA, spawns an ego vehicle with a roof LiDAR and a forward \n\
                  RGB camera, drives on autopilot for a fixed number of simulator frames and \n\
                  writes velodyne/{frame:06}.bin and images/{frame:06}.png under the output root."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CARLA_CAPTURE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "CARLA_CAPTURE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a capture
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults if omitted
    #[arg(short, long, env = "CARLA_CAPTURE_CONFIG")]
    pub config: Option<PathBuf>,

    /// CARLA server host [default: 127.0.0.1]
    #[arg(long, env = "CARLA_HOST")]
    pub host: Option<String>,

    /// CARLA server port [default: 2000]
    #[arg(long, env = "CARLA_PORT")]
    pub port: Option<u16>,

    /// Number of simulator frames to capture [default: 600]
    #[arg(long, env = "CARLA_CAPTURE_FRAMES")]
    pub frames: Option<u64>,

    /// Output root; velodyne/ and images/ are created beneath it
    #[arg(short, long, env = "CARLA_CAPTURE_OUT")]
    pub out: Option<PathBuf>,

    /// Connect timeout in seconds [default: 5]
    #[arg(long, env = "CARLA_CAPTURE_TIMEOUT")]
    pub timeout: Option<f64>,

    /// Print the merged configuration and exit without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Capture from the in-process mock simulator instead of a CARLA server
    #[arg(long)]
    pub mock: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CARLA_CAPTURE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "capture.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
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

//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Sensor Listener - stream, dump and inspect depth sensor frames
#[derive(Parser, Debug)]
#[command(
    name = "sensor-listener",
    author,
    version,
    about = "Depth sensor listeners and point-cloud organization",
    long_about = "Builds sensor listeners from a TOML or JSON setup, streams composite \n\
                  frames from saved data, buffer directories or synthetic devices, \n\
                  and organizes unorganized LiDAR clouds into dense grids."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SENSOR_LISTENER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SENSOR_LISTENER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Prometheus metrics port (disabled when absent)
    #[arg(long, global = true, env = "SENSOR_LISTENER_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a listener setup without opening any source
    Validate(ValidateArgs),

    /// Build listeners and print their sensor info and status
    Info(InfoArgs),

    /// Stream listeners and save every consumed frame
    Dump(DumpArgs),

    /// Stream one listener and report frame age and drop statistics
    Watch(WatchArgs),

    /// Organize a .ply point cloud into a dense point grid
    Organize(OrganizeArgs),
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to listener setup (TOML or JSON)
    #[arg(short, long, default_value = "listeners.toml", env = "SENSOR_LISTENER_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to listener setup (TOML or JSON)
    #[arg(short, long, default_value = "listeners.toml", env = "SENSOR_LISTENER_CONFIG")]
    pub config: PathBuf,

    /// Only this listener
    #[arg(short, long)]
    pub listener: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `dump` command
#[derive(Parser, Debug)]
pub struct DumpArgs {
    /// Path to listener setup (TOML or JSON)
    #[arg(short, long, default_value = "listeners.toml", env = "SENSOR_LISTENER_CONFIG")]
    pub config: PathBuf,

    /// Output directory; each listener writes under `<out>/<name>`
    #[arg(short, long)]
    pub out: PathBuf,

    /// Only this listener
    #[arg(short, long)]
    pub listener: Option<String>,

    /// Stop after this many frames per listener
    #[arg(long)]
    pub max_frames: Option<u32>,
}

/// Arguments for the `watch` command
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Path to listener setup (TOML or JSON)
    #[arg(short, long, default_value = "listeners.toml", env = "SENSOR_LISTENER_CONFIG")]
    pub config: PathBuf,

    /// Listener to watch (defaults to the first one)
    #[arg(short, long)]
    pub listener: Option<String>,

    /// Number of frames to consume
    #[arg(long, default_value = "100")]
    pub frames: u32,
}

/// Arguments for the `organize` command
#[derive(Parser, Debug)]
pub struct OrganizeArgs {
    /// Unorganized point cloud (.ply)
    pub input: PathBuf,

    /// Focal length along x, in pixels
    #[arg(long)]
    pub fx: f32,

    /// Focal length along y, in pixels
    #[arg(long)]
    pub fy: f32,

    /// Principal point x, in pixels
    #[arg(long)]
    pub cx: f32,

    /// Principal point y, in pixels
    #[arg(long)]
    pub cy: f32,

    /// Floor-median window extent (0 disables filtering)
    #[arg(long, default_value = "0")]
    pub filter: usize,

    /// Output grid (.npy)
    #[arg(short, long)]
    pub out: PathBuf,
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

//! CLI arguments for yarn-usage-agent.
//!
//! The agent has no subcommands; it starts, registers the instance, and runs
//! until terminated. Flags only override configuration.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "yarn-usage-agent",
    about = "Reports per-container CPU usage of YARN worker processes to a central collector",
    long_about = "Reports per-container CPU usage of YARN worker processes to a central collector.\n\n\
                  The agent scans the process table for JVM container processes, samples their \
                  CPU consumption relative to host-wide usage, and pushes usage records and \
                  container termination notifications to the configured collector.",
    author = "Michael Moll <agent@herakles.now> - Herakles",
    version = "0.1.0"
)]
pub struct Args {
    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Base URL of the usage collector
    #[arg(long)]
    pub sink_url: Option<String>,

    /// Static instance id (skips the EC2 metadata lookup)
    #[arg(long)]
    pub instance_id: Option<String>,

    /// Command name of container processes to track
    #[arg(long)]
    pub process_name: Option<String>,

    /// Seconds between process table scans
    #[arg(long)]
    pub discovery_interval_secs: Option<u64>,

    /// Seconds between CPU samples of a tracked process
    #[arg(long)]
    pub sample_interval_secs: Option<u64>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

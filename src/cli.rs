//! CLI arguments and subcommands for herakles-rdt-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
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

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Counter source used for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Linux resctrl filesystem
    Resctrl,
    /// Random telemetry for hosts without RDT
    Synthetic,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Resctrl => "resctrl",
            BackendKind::Synthetic => "synthetic",
        }
    }
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-rdt-exporter",
    about = "Prometheus exporter for Intel RDT core-group telemetry",
    long_about = "Prometheus exporter for Intel RDT core-group telemetry.\n\n\
                  Samples last level cache occupancy, local/remote/total memory bandwidth \
                  and instructions per cycle for administrator-defined groups of CPU cores \
                  and exposes them as Prometheus metrics.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-rdt-exporter — More info: https://www.herakles.now — Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Seconds between two monitoring ticks
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Monitoring backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// resctrl filesystem mount point
    #[arg(long)]
    pub resctrl_path: Option<PathBuf>,

    /// Host name attached to every series (default: system host name)
    #[arg(long)]
    pub hostname: Option<String>,

    /// Core groups, one range list per flag (overrides the config file)
    #[arg(long = "cores", value_name = "RANGES")]
    pub cores: Vec<String>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the resolved core group table
    Groups {
        /// List every core of each group
        #[arg(long)]
        verbose: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run monitoring ticks and print the dispatched series
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print a debug dump of every reading
        #[arg(long)]
        verbose: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Check runtime requirements and permissions
    CheckRequirements,
}

//! CLI module for gosv-log
//!
//! Argument parsing and subcommand dispatch of the `gosv-log` binary.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// gosv-log - guest OS validation run logging
///
/// Replays recorded run events through the gosv-log plugin.
#[derive(Parser, Debug, Clone)]
#[command(name = "gosv-log")]
#[command(author = "gosv-log Contributors")]
#[command(version)]
#[command(about = "Guest OS validation run logs and reports", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file (TOML or YAML)
    #[arg(short = 'c', long, global = true, env = "GOSV_LOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project directory, overriding the configuration
    #[arg(short = 'p', long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Directory holding run log directories, overriding the configuration
    #[arg(long, global = true)]
    pub log_root: Option<PathBuf>,

    /// Do not print summaries to the console
    #[arg(long, global = true)]
    pub no_console: bool,
}

/// Configuration output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Toml,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Replay a recorded event stream (one JSON event per line)
    Replay(commands::replay::ReplayArgs),

    /// Print the effective configuration
    #[command(name = "show-config")]
    ShowConfig(ShowConfigArgs),
}

/// Arguments for show-config command
#[derive(Parser, Debug, Clone)]
pub struct ShowConfigArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = ConfigFormat::Yaml)]
    pub format: ConfigFormat,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }
}

//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use quotebar_config::DEFAULT_CONFIG_PATH;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quotebar")]
#[command(author, version, about = "Live quote line for status bars")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "QUOTEBAR_CONFIG")]
    pub config: PathBuf,

    /// Log level (defaults to logging.level from the configuration)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Refresh in the background and print the display line
    Run(RunArgs),
    /// Fetch every symbol once and print the result
    Once(OnceArgs),
    /// List available providers
    Providers,
    /// Validate configuration
    ValidateConfig,
    /// Write the default configuration file
    InitConfig(InitConfigArgs),
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// How often the display line is printed, in milliseconds
    #[arg(long, default_value = "1000")]
    pub refresh_ms: u64,

    /// Do not reload when the configuration file changes
    #[arg(long)]
    pub no_watch: bool,
}

#[derive(clap::Args)]
pub struct OnceArgs {
    /// Print cached records as JSON instead of the display line
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct InitConfigArgs {
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

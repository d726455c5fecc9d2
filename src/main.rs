//! Quote bar CLI application.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use quotebar_config::load_config;
use quotebar_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The logging section is optional; a broken file is reported by the command
    let logging = load_config(&cli.config).map(|c| c.logging).unwrap_or_default();
    let log_level = match cli.log_level {
        Some(cli::LogLevel::Trace) => "trace",
        Some(cli::LogLevel::Debug) => "debug",
        Some(cli::LogLevel::Info) => "info",
        Some(cli::LogLevel::Warn) => "warn",
        Some(cli::LogLevel::Error) => "error",
        None => logging.level.as_str(),
    };
    let json = cli.json_logs || logging.format.eq_ignore_ascii_case("json");
    let _log_guard = setup_logging(log_level, json, logging.file.as_deref().map(std::path::Path::new));

    // Execute command
    match cli.command {
        Commands::Run(args) => cli::commands::run::run(args, &cli.config).await,
        Commands::Once(args) => cli::commands::once::run(args, &cli.config).await,
        Commands::Providers => cli::commands::providers::run().await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config).await,
        Commands::InitConfig(args) => cli::commands::init_config::run(args, &cli.config).await,
    }
}

//! Run command: background refresh with a printed display line.

use anyhow::{Context, Result};
use quotebar_config::load_or_init;
use quotebar_engine::QuoteBoard;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;

pub async fn run(args: RunArgs, config_path: &Path) -> Result<()> {
    let config = load_or_init(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let board = QuoteBoard::from_config(config).context("failed to build quote board")?;

    board.start();
    if !args.no_watch {
        board.watch_config(config_path);
        info!(path = %config_path.display(), "watching configuration file");
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(args.refresh_ms.max(50)));
    let mut last = String::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let line = board.rendered_display_string();
                if line != last {
                    println!("{}", line);
                    last = line;
                }
            }
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for Ctrl-C")?;
                info!("interrupt received, shutting down");
                break;
            }
        }
    }

    board.shutdown().await;
    Ok(())
}

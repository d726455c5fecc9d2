//! Single refresh pass.

use anyhow::{Context, Result};
use quotebar_config::load_config;
use quotebar_engine::QuoteBoard;
use std::path::Path;

use crate::cli::OnceArgs;

pub async fn run(args: OnceArgs, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let board = QuoteBoard::from_config(config).context("failed to build quote board")?;

    board.refresh_once().await;
    board.save_cache();

    if args.json {
        let snapshot = board.snapshot();
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("{}", board.rendered_display_string());
    }

    Ok(())
}

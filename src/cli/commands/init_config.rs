//! Write the default configuration.

use anyhow::{bail, Result};
use quotebar_config::write_default_config;
use std::path::Path;

use crate::cli::InitConfigArgs;

pub async fn run(args: InitConfigArgs, config_path: &Path) -> Result<()> {
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    write_default_config(config_path)?;
    println!("Wrote default configuration to {}", config_path.display());
    Ok(())
}

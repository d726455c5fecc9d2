//! Validate configuration command.

use anyhow::Result;
use quotebar_config::load_config;
use quotebar_providers::ProviderRegistry;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    let checked = load_config(config_path).and_then(|config| {
        ProviderRegistry::with_defaults(&config.providers)?.resolve_all(&config.symbols)?;
        Ok(config)
    });

    match checked {
        Ok(config) => {
            println!("Configuration is valid!");
            println!();
            println!("Symbols: {}", config.symbols.len());
            for key in &config.symbols {
                println!("  {} (ttl {}s)", key, config.ttl_for(key.provider()).as_secs());
            }
            println!("Display mode: {:?}", config.display_mode);
            println!("Display format: {}", config.display_format);
            println!("Update interval: {}s", config.update_interval_seconds);
            println!("Rotate interval: {}s", config.rotate_interval_seconds);
            println!("Log level: {}", config.logging.level);
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}

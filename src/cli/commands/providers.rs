//! List providers command.

use anyhow::Result;
use quotebar_providers::{ProviderRegistry, ProviderSettings};

pub async fn run() -> Result<()> {
    let registry = ProviderRegistry::with_defaults(&ProviderSettings::default())?;

    println!("Available Providers");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        println!("  {} ", info.name);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        if !info.examples.is_empty() {
            println!("  e.g. {}", info.examples.join(", "));
        }
        println!();
    }

    println!("Symbols are written as provider:instrument; a bare instrument is a stock.");

    Ok(())
}

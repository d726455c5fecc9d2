//! Loading and writing configuration files.

use config::{Config, Environment, File};
use quotebar_core::error::ConfigError;
use std::path::Path;
use tracing::info;

use crate::settings::Configuration;

/// Where the CLI looks for its configuration by default.
pub const DEFAULT_CONFIG_PATH: &str = "config/quotebar.toml";

/// Load configuration from file and environment, then validate it.
///
/// Environment variables use the `QUOTEBAR` prefix and `__` as the nesting
/// separator, e.g. `QUOTEBAR__CACHE__TTL_SECONDS=30`. `QUOTEBAR__SYMBOLS`
/// takes a comma separated list.
pub fn load_config(path: &Path) -> Result<Configuration, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("QUOTEBAR")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("symbols"),
        )
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let configuration: Configuration = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;
    configuration.validate()?;
    Ok(configuration)
}

/// Write the default configuration to `path`, creating parent directories.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let body = toml::to_string_pretty(&Configuration::default())
        .map_err(|e| ConfigError::Load(format!("failed to serialize defaults: {}", e)))?;
    std::fs::write(path, body)?;
    Ok(())
}

/// Load `path`, writing the defaults first if the file does not exist.
pub fn load_or_init(path: &Path) -> Result<Configuration, ConfigError> {
    if !path.exists() {
        write_default_config(path)?;
        info!(path = %path.display(), "wrote default configuration");
    }
    load_config(path)
}

//! Configuration management.

mod loader;
mod settings;
mod store;
mod template;
mod watcher;

pub use loader::{load_config, load_or_init, write_default_config, DEFAULT_CONFIG_PATH};
pub use settings::{
    BackoffSettings, CacheSettings, ChartSettings, Configuration, DisplayMode, LoggingConfig,
};
pub use store::ConfigStore;
pub use template::{DisplayTemplate, Placeholder, Segment, DEFAULT_TEMPLATE};
pub use watcher::ConfigWatcher;

pub use quotebar_providers::ProviderSettings;

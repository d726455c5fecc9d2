//! Data providers.

mod http;
mod network;
mod registry;
mod settings;
mod stock;
mod system;
mod weather;

pub use network::NetworkProvider;
pub use registry::{ProviderInfo, ProviderRegistry};
pub use settings::{NetworkSettings, ProviderSettings, StockSettings, WeatherSettings};
pub use stock::StockProvider;
pub use system::SystemProvider;
pub use weather::WeatherProvider;

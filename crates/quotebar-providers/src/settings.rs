//! Provider settings.

use serde::{Deserialize, Serialize};

/// Settings for all built-in providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSettings {
    #[serde(default)]
    pub stock: StockSettings,
    #[serde(default)]
    pub weather: WeatherSettings,
    #[serde(default)]
    pub network: NetworkSettings,
}

/// Stock quote endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockSettings {
    /// Quote list endpoint; the market code is appended
    pub base_url: String,
    /// The endpoint rejects requests without a finance referer
    pub referer: String,
}

impl Default for StockSettings {
    fn default() -> Self {
        Self {
            base_url: "https://hq.sinajs.cn/list=".to_string(),
            referer: "https://finance.sina.com.cn".to_string(),
        }
    }
}

/// OpenWeatherMap settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    pub api_key: String,
    pub base_url: String,
    /// `metric`, `imperial` or `standard`
    pub units: String,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            units: "metric".to_string(),
        }
    }
}

/// Public address lookup endpoints, tried in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub ip_endpoints: Vec<String>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            ip_endpoints: vec![
                "https://api.ipify.org".to_string(),
                "https://ifconfig.me/ip".to_string(),
            ],
        }
    }
}

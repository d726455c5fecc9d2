//! Configuration structures.

use quotebar_core::error::ConfigError;
use quotebar_core::types::{FetchKey, DEFAULT_FLAT_BAND};
use quotebar_providers::ProviderSettings;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::template::DisplayTemplate;

/// How the active keys are combined into one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Single,
    Rotate,
    Multi,
}

/// Main application configuration.
///
/// Replaced as a whole on reload; nothing mutates a published value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub update_interval_seconds: u64,
    pub display_mode: DisplayMode,
    pub rotate_interval_seconds: u64,
    /// Ordered `provider:instrument` keys; a bare instrument is a stock
    pub symbols: Vec<FetchKey>,
    pub display_format: DisplayTemplate,
    /// Key shown in single mode; the first symbol when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_symbol: Option<FetchKey>,
    pub max_multi: usize,
    pub separator: String,
    pub use_color: bool,
    /// Changes within this many percent points count as flat
    pub flat_band: f64,
    pub fetch_timeout_seconds: u64,
    pub max_concurrent_fetches: usize,
    pub config_poll_seconds: u64,
    pub logging: LoggingConfig,
    pub cache: CacheSettings,
    pub backoff: BackoffSettings,
    pub chart: ChartSettings,
    pub providers: ProviderSettings,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            update_interval_seconds: 5,
            display_mode: DisplayMode::Single,
            rotate_interval_seconds: 10,
            symbols: vec![FetchKey::new("stock", "600519"), FetchKey::new("stock", "000001")],
            display_format: DisplayTemplate::default(),
            primary_symbol: None,
            max_multi: 3,
            separator: " | ".to_string(),
            use_color: true,
            flat_band: DEFAULT_FLAT_BAND,
            fetch_timeout_seconds: 10,
            max_concurrent_fetches: 8,
            config_poll_seconds: 1,
            logging: LoggingConfig::default(),
            cache: CacheSettings::default(),
            backoff: BackoffSettings::default(),
            chart: ChartSettings::default(),
            providers: ProviderSettings::default(),
        }
    }
}

impl Configuration {
    /// Check every field that the rest of the system relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("update_interval_seconds", self.update_interval_seconds)?;
        positive("rotate_interval_seconds", self.rotate_interval_seconds)?;
        positive("fetch_timeout_seconds", self.fetch_timeout_seconds)?;
        positive("config_poll_seconds", self.config_poll_seconds)?;
        positive("cache.ttl_seconds", self.cache.ttl_seconds)?;
        positive("cache.persist_interval_seconds", self.cache.persist_interval_seconds)?;
        for (provider, ttl) in &self.cache.provider_ttl {
            if *ttl == 0 {
                return Err(ConfigError::InvalidInterval {
                    field: "cache.provider_ttl",
                    value: format!("{} = {}", provider, ttl),
                });
            }
        }

        if self.max_concurrent_fetches == 0 {
            return Err(invalid("max_concurrent_fetches", "must be at least 1"));
        }
        if self.max_multi == 0 {
            return Err(invalid("max_multi", "must be at least 1"));
        }
        if !self.flat_band.is_finite() || self.flat_band < 0.0 {
            return Err(invalid("flat_band", "must be a non-negative number"));
        }
        if self.cache.sweep_factor == 0 {
            return Err(invalid("cache.sweep_factor", "must be at least 1"));
        }
        if self.cache.degraded_factor == 0 {
            return Err(invalid("cache.degraded_factor", "must be at least 1"));
        }
        self.backoff.validate()?;
        self.chart.validate()?;

        let mut seen = HashSet::new();
        for key in &self.symbols {
            if !seen.insert(key) {
                return Err(ConfigError::InvalidKey {
                    key: key.to_string(),
                    reason: "listed more than once".to_string(),
                });
            }
        }
        if let Some(primary) = &self.primary_symbol {
            if !seen.contains(primary) {
                return Err(ConfigError::InvalidKey {
                    key: primary.to_string(),
                    reason: "primary_symbol is not in symbols".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Active keys as a set.
    pub fn key_set(&self) -> HashSet<FetchKey> {
        self.symbols.iter().cloned().collect()
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_seconds)
    }

    pub fn rotate_interval(&self) -> Duration {
        Duration::from_secs(self.rotate_interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn config_poll_interval(&self) -> Duration {
        Duration::from_secs(self.config_poll_seconds)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.cache.persist_interval_seconds)
    }

    /// TTL for records of `provider`.
    pub fn ttl_for(&self, provider: &str) -> Duration {
        let secs = self
            .cache
            .provider_ttl
            .get(provider)
            .copied()
            .unwrap_or(self.cache.ttl_seconds);
        Duration::from_secs(secs)
    }
}

fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidInterval {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Cache lifetimes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_seconds: u64,
    /// Entries older than `sweep_factor × ttl` are dropped
    pub sweep_factor: u32,
    /// Records older than `degraded_factor × ttl` are marked degraded
    pub degraded_factor: u32,
    /// Per-provider TTL overrides
    pub provider_ttl: HashMap<String, u64>,
    /// Snapshot file restored at startup; persistence is off when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_path: Option<String>,
    pub persist_interval_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: 60,
            sweep_factor: 10,
            degraded_factor: 3,
            provider_ttl: HashMap::new(),
            persist_path: None,
            persist_interval_seconds: 60,
        }
    }
}

/// Retry backoff after failed fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub initial_seconds: u64,
    pub multiplier: f64,
    pub max_seconds: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_seconds: 10,
            multiplier: 2.0,
            max_seconds: 300,
        }
    }
}

impl BackoffSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("backoff.initial_seconds", self.initial_seconds)?;
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(invalid("backoff.multiplier", "must be at least 1.0"));
        }
        if self.max_seconds < self.initial_seconds {
            return Err(invalid(
                "backoff.max_seconds",
                "must not be smaller than backoff.initial_seconds",
            ));
        }
        Ok(())
    }

    /// Delay after `failures` consecutive failures (at least one).
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(64) as i32;
        let secs = self.initial_seconds as f64 * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_seconds as f64);
        // u64::MAX as f64 rounds past Duration::MAX
        Duration::try_from_secs_f64(capped.max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// Chart sample retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    pub window_minutes: u64,
    pub max_samples: usize,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            window_minutes: 180,
            max_samples: 360,
        }
    }
}

impl ChartSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("chart.window_minutes", self.window_minutes)?;
        if self.max_samples == 0 {
            return Err(invalid("chart.max_samples", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Configuration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ttl_for("stock"), Duration::from_secs(60));
    }

    #[test]
    fn test_provider_ttl_override() {
        let mut config = Configuration::default();
        config.cache.provider_ttl.insert("weather".into(), 600);

        assert_eq!(config.ttl_for("weather"), Duration::from_secs(600));
        assert_eq!(config.ttl_for("system"), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = Configuration {
            update_interval_seconds: 0,
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::InvalidInterval { field, .. }) => {
                assert_eq!(field, "update_interval_seconds")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_symbols_rejected() {
        let config = Configuration {
            symbols: vec!["600519".parse().unwrap(), "stock:600519".parse().unwrap()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidKey { .. })));
    }

    #[test]
    fn test_primary_symbol_must_be_listed() {
        let config = Configuration {
            primary_symbol: Some("system:cpu".parse().unwrap()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidKey { .. })));
    }

    #[test]
    fn test_empty_symbols_allowed() {
        let config = Configuration {
            symbols: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_delay() {
        let backoff = BackoffSettings::default();

        assert_eq!(backoff.delay(1), Duration::from_secs(10));
        assert_eq!(backoff.delay(2), Duration::from_secs(20));
        assert_eq!(backoff.delay(3), Duration::from_secs(40));
        assert_eq!(backoff.delay(10), Duration::from_secs(300));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let backoff = BackoffSettings {
            initial_seconds: 1,
            multiplier: 2.0,
            max_seconds: u64::MAX,
        };
        let config = Configuration {
            backoff: backoff.clone(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(70), Duration::MAX);
        assert_eq!(backoff.delay(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_backoff_validation() {
        let config = Configuration {
            backoff: BackoffSettings {
                multiplier: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }
}

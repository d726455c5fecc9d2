//! Provider registry.
//!
//! The registry is built once at startup and is read-only afterwards, so
//! it can be shared between the scheduler and config validation without
//! locking.

use quotebar_core::error::ConfigError;
use quotebar_core::traits::Provider;
use quotebar_core::types::FetchKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::network::NetworkProvider;
use crate::settings::ProviderSettings;
use crate::stock::StockProvider;
use crate::system::SystemProvider;
use crate::weather::WeatherProvider;

/// Information about a registered provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Registry name
    pub name: String,
    /// Provider description
    pub description: String,
    /// Example instrument identifiers
    pub examples: Vec<String>,
}

/// Name to provider map.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in providers.
    pub fn with_defaults(settings: &ProviderSettings) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        registry.register(Arc::new(StockProvider::new(settings.stock.clone())?));
        registry.register(Arc::new(SystemProvider::new()));
        registry.register(Arc::new(NetworkProvider::new(settings.network.clone())?));
        registry.register(Arc::new(WeatherProvider::new(settings.weather.clone())?));
        Ok(registry)
    }

    /// Register a provider under its own name, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Get a provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Get a provider by name or fail with `UnknownProvider`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Provider>, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::UnknownProvider(name.to_string()))
    }

    /// Check that every key names a registered provider.
    pub fn resolve_all<'a, I>(&self, keys: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = &'a FetchKey>,
    {
        for key in keys {
            self.resolve(key.provider())?;
        }
        Ok(())
    }

    /// Check if a provider exists.
    pub fn exists(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Sorted provider names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Describe all providers, sorted by name.
    pub fn list(&self) -> Vec<ProviderInfo> {
        let mut infos: Vec<ProviderInfo> = self
            .providers
            .values()
            .map(|p| ProviderInfo {
                name: p.name().to_string(),
                description: p.description().to_string(),
                examples: p.examples().iter().map(|s| s.to_string()).collect(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quotebar_core::error::FetchError;
    use quotebar_core::types::QuoteRecord;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        async fn fetch(&self, id: &str, _timeout: Duration) -> Result<QuoteRecord, FetchError> {
            Ok(QuoteRecord::new(id, id, 1.0, 0.0))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn test_registry_defaults() {
        let registry = ProviderRegistry::with_defaults(&ProviderSettings::default()).unwrap();

        assert_eq!(registry.names(), vec!["network", "stock", "system", "weather"]);
        assert!(registry.exists("stock"));
        assert!(registry.get("crypto").is_none());
    }

    #[test]
    fn test_registry_list() {
        let registry = ProviderRegistry::with_defaults(&ProviderSettings::default()).unwrap();
        let infos = registry.list();

        assert_eq!(infos.len(), 4);
        let stock = infos.iter().find(|i| i.name == "stock").unwrap();
        assert!(stock.examples.contains(&"600519".to_string()));
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = ProviderRegistry::new();

        match registry.resolve("crypto") {
            Err(ConfigError::UnknownProvider(name)) => assert_eq!(name, "crypto"),
            other => panic!("unexpected: {:?}", other.map(|p| p.name().to_string())),
        }
    }

    #[test]
    fn test_resolve_all() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(Echo));

        let good: FetchKey = "echo:a".parse().unwrap();
        let bad: FetchKey = "crypto:btc".parse().unwrap();

        assert!(registry.resolve_all([&good]).is_ok());
        assert!(matches!(
            registry.resolve_all([&good, &bad]),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[tokio::test]
    async fn test_registered_provider_fetch() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(Echo));

        let provider = registry.resolve("echo").unwrap();
        let record = provider.fetch("x", Duration::from_secs(1)).await.unwrap();
        assert_eq!(record.instrument_id, "x");
    }
}

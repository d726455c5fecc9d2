//! Shared holder for the active configuration.

use std::sync::Arc;
use tokio::sync::watch;

use crate::settings::Configuration;

/// Holds the active [`Configuration`] and publishes replacements.
///
/// Readers get an `Arc` snapshot and never observe a half-applied update.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    tx: Arc<watch::Sender<Arc<Configuration>>>,
}

impl ConfigStore {
    pub fn new(config: Configuration) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(config));
        Self { tx: Arc::new(tx) }
    }

    /// Current configuration snapshot.
    pub fn current(&self) -> Arc<Configuration> {
        Arc::clone(&self.tx.borrow())
    }

    /// Swap in a new configuration and return the previous one.
    pub fn replace(&self, config: Configuration) -> Arc<Configuration> {
        self.tx.send_replace(Arc::new(config))
    }

    /// Receiver notified on every replacement.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Configuration>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_returns_previous() {
        let store = ConfigStore::new(Configuration::default());
        let next = Configuration {
            update_interval_seconds: 42,
            ..Default::default()
        };

        let previous = store.replace(next);

        assert_eq!(previous.update_interval_seconds, 5);
        assert_eq!(store.current().update_interval_seconds, 42);
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let store = ConfigStore::new(Configuration::default());
        let snapshot = store.current();

        store.replace(Configuration {
            symbols: vec![],
            ..Default::default()
        });

        assert_eq!(snapshot.symbols.len(), 2);
        assert!(store.current().symbols.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = ConfigStore::new(Configuration::default());
        let mut rx = store.subscribe();

        store.replace(Configuration {
            max_multi: 1,
            ..Default::default()
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().max_multi, 1);
    }
}

//! Quote board: the facade the presentation layer talks to.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use quotebar_cache::QuoteCache;
use quotebar_config::{load_config, ConfigStore, ConfigWatcher, Configuration};
use quotebar_core::error::ConfigError;
use quotebar_core::types::{ChartPoint, FetchKey, QuoteRecord};
use quotebar_monitor::{Aggregator, Rotation, PLACEHOLDER};
use quotebar_providers::ProviderRegistry;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::scheduler::{history_policy, Scheduler};
use crate::state::KeyStatus;

/// One cached record with its refresh state, as shown by `once --json`.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteSnapshot {
    pub key: FetchKey,
    pub record: QuoteRecord,
    pub fresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<KeyStatus>,
}

struct BoardInner {
    store: ConfigStore,
    registry: Arc<ProviderRegistry>,
    cache: Arc<QuoteCache>,
    scheduler: Scheduler,
    rotation: Arc<Rotation>,
    reload_lock: Mutex<()>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Owns the configuration store, cache and scheduler, and renders the
/// display line on demand.
#[derive(Clone)]
pub struct QuoteBoard {
    inner: Arc<BoardInner>,
}

impl QuoteBoard {
    /// Build a board with the built-in providers configured from `config`.
    pub fn from_config(config: Configuration) -> Result<Self, ConfigError> {
        let registry = ProviderRegistry::with_defaults(&config.providers)?;
        Self::new(config, registry)
    }

    /// Build a board. Fails if the configuration is invalid or names a
    /// provider missing from `registry`.
    pub fn new(config: Configuration, registry: ProviderRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        registry.resolve_all(&config.symbols)?;

        let cache = Arc::new(QuoteCache::new(history_policy(&config)));
        if let Some(path) = &config.cache.persist_path {
            match cache.load_from(Path::new(path), &config.key_set()) {
                Ok(restored) => info!(path = %path, restored, "restored cached quotes"),
                Err(e) => warn!(path = %path, error = %e, "ignoring unreadable cache file"),
            }
        }
        let registry = Arc::new(registry);
        let store = ConfigStore::new(config);
        let scheduler = Scheduler::new(store.clone(), Arc::clone(&registry), Arc::clone(&cache));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(BoardInner {
                store,
                registry,
                cache,
                scheduler,
                rotation: Arc::new(Rotation::new()),
                reload_lock: Mutex::new(()),
                shutdown,
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Spawn the tick loop and the rotation ticker. Calling it again while
    /// running does nothing.
    pub fn start(&self) {
        let mut tasks = self.inner.tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        let scheduler = self.inner.scheduler.clone();
        tasks.push(tokio::spawn(scheduler.run(self.inner.shutdown.subscribe())));
        tasks.push(tokio::spawn(run_rotation(
            Arc::clone(&self.inner.rotation),
            self.inner.store.clone(),
            self.inner.shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(run_persist(self.clone(), self.inner.shutdown.subscribe())));
        info!(keys = self.inner.store.current().symbols.len(), "quote board started");
    }

    /// Watch `path` and reload whenever it settles after a change.
    pub fn watch_config(&self, path: impl Into<PathBuf>) {
        let poll = self.inner.store.current().config_poll_interval();
        let watcher = ConfigWatcher::new(path, poll);
        let (tx, mut rx) = mpsc::channel(4);
        let mut shutdown = self.inner.shutdown.subscribe();
        let board = self.clone();

        let mut tasks = self.inner.tasks.lock();
        tasks.push(tokio::spawn(watcher.run(tx, self.inner.shutdown.subscribe())));
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = rx.recv() => match changed {
                        // errors are logged by reload_from
                        Some(path) => { let _ = board.reload_from(&path); }
                        None => break,
                    },
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        }));
    }

    /// Signal every background task to stop and wait for them.
    pub async fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        self.save_cache_blocking().await;
        info!("quote board stopped");
    }

    /// Run one tick now and wait for the fetches it dispatched.
    pub async fn refresh_once(&self) {
        let handles = self.inner.scheduler.tick_at(Utc::now());
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "fetch task ended abnormally");
            }
        }
    }

    /// Current display line. Never blocks on I/O and never panics.
    pub fn rendered_display_string(&self) -> String {
        self.render_at(Utc::now())
    }

    /// Display line at an explicit clock.
    pub fn render_at(&self, now: DateTime<Utc>) -> String {
        let config = self.inner.store.current();
        let index = self.inner.rotation.index();
        let cache = &self.inner.cache;

        catch_unwind(AssertUnwindSafe(|| Aggregator::new(&config, cache).render(index, now)))
            .unwrap_or_else(|_| {
                error!("rendering the display line panicked");
                PLACEHOLDER.to_string()
            })
    }

    /// Chart samples for `key`, oldest first.
    pub fn chart_data(&self, key: &FetchKey) -> Option<Vec<ChartPoint>> {
        self.inner.cache.history(key)
    }

    /// Validate and apply a new configuration.
    ///
    /// On error the running configuration is left untouched. Provider
    /// settings are only read at startup.
    pub fn reload(&self, config: Configuration) -> Result<(), ConfigError> {
        let _guard = self.inner.reload_lock.lock();

        if let Err(e) = config
            .validate()
            .and_then(|_| self.inner.registry.resolve_all(&config.symbols))
        {
            warn!(error = %e, "configuration reload rejected");
            return Err(e);
        }

        if config.providers != self.inner.store.current().providers {
            warn!("provider settings changed; restart to apply them");
        }

        self.inner.store.replace(config);
        let current = self.inner.store.current();
        let report = self.inner.scheduler.reconcile(&current);
        info!(
            keys = current.symbols.len(),
            added = report.added.len(),
            removed = report.removed.len(),
            "configuration reload applied"
        );
        Ok(())
    }

    /// Load `path` and apply it as with [`reload`](Self::reload).
    pub fn reload_from(&self, path: &Path) -> Result<(), ConfigError> {
        let config = load_config(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "configuration reload rejected");
            e
        })?;
        self.reload(config)
    }

    /// Write the cache to `cache.persist_path`, if set. Failures are logged.
    pub fn save_cache(&self) -> Option<usize> {
        let config = self.inner.store.current();
        let path = config.cache.persist_path.as_deref()?;
        match self.inner.cache.save_to(Path::new(path)) {
            Ok(saved) => Some(saved),
            Err(e) => {
                warn!(path = %path, error = %e, "failed to save cache");
                None
            }
        }
    }

    async fn save_cache_blocking(&self) {
        if self.inner.store.current().cache.persist_path.is_none() {
            return;
        }
        let board = self.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || board.save_cache()).await {
            warn!(error = %e, "cache save task ended abnormally");
        }
    }

    /// Active configuration.
    pub fn configuration(&self) -> Arc<Configuration> {
        self.inner.store.current()
    }

    /// Refresh state of `key`, `None` if the key is not active.
    pub fn key_status(&self, key: &FetchKey) -> Option<KeyStatus> {
        self.inner.scheduler.key_status(key)
    }

    /// Cached records for the active keys, in configured order.
    pub fn snapshot(&self) -> Vec<QuoteSnapshot> {
        let config = self.inner.store.current();
        let now = Utc::now();

        config
            .symbols
            .iter()
            .filter_map(|key| {
                let entry = self.inner.cache.entry(key)?;
                Some(QuoteSnapshot {
                    key: key.clone(),
                    record: (*entry.record).clone(),
                    fresh: entry.is_fresh_at(now),
                    status: self.inner.scheduler.key_status(key),
                })
            })
            .collect()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    pub fn rotation(&self) -> &Rotation {
        &self.inner.rotation
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.inner.cache
    }
}

/// Advance `rotation` every `rotate_interval_seconds`, read live.
async fn run_rotation(rotation: Arc<Rotation>, store: ConfigStore, mut shutdown: watch::Receiver<bool>) {
    loop {
        let interval = store.current().rotate_interval();
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                rotation.advance();
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Save the cache every `persist_interval_seconds`, read live.
async fn run_persist(board: QuoteBoard, mut shutdown: watch::Receiver<bool>) {
    loop {
        let interval = board.inner.store.current().persist_interval();
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                board.save_cache_blocking().await;
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

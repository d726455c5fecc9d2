//! Refresh scheduler.
//!
//! Every tick walks the active keys and dispatches a fetch for each key
//! that is idle, has no fresh cache entry and is not backing off. Per-key
//! state lives in a `DashMap`; the Idle to Fetching transition happens under
//! the key's shard lock, so a key never has two fetches in flight.
//!
//! The watchdog deadline runs from the moment a fetch obtains its permit,
//! so keys queued behind a slow upstream are not charged for the wait.
//!
//! Each dispatch gets a ticket. A completion is applied only while the key
//! is still `Fetching` with that ticket, and the cache write happens while
//! the state entry is held, so a fetch that outlives its key (reload, or
//! watchdog expiry) is dropped instead of resurrecting the entry.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use quotebar_cache::{HistoryPolicy, QuoteCache};
use quotebar_config::{ConfigStore, Configuration};
use quotebar_core::error::FetchError;
use quotebar_core::types::{FetchKey, QuoteRecord};
use quotebar_providers::ProviderRegistry;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::{KeyState, KeyStatus, Phase};

/// Extra time a fetch may run past its timeout before the watchdog
/// reclaims the key.
pub const WATCHDOG_GRACE: Duration = Duration::from_secs(5);

/// Keys touched by a reconcile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<FetchKey>,
    pub removed: Vec<FetchKey>,
    pub invalidated: Vec<FetchKey>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.invalidated.is_empty()
    }
}

struct Inner {
    store: ConfigStore,
    registry: Arc<ProviderRegistry>,
    cache: Arc<QuoteCache>,
    states: DashMap<FetchKey, KeyState>,
    known: Mutex<HashSet<FetchKey>>,
    permits: Arc<Semaphore>,
    next_ticket: AtomicU64,
    wake: Notify,
}

/// Drives periodic refreshes of the active keys.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

pub(crate) fn history_policy(config: &Configuration) -> HistoryPolicy {
    let window = to_chrono(Duration::from_secs(config.chart.window_minutes.saturating_mul(60)));
    HistoryPolicy::new(config.chart.max_samples, window)
}

/// Durations too large for chrono are clamped to a year.
fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d)
        .ok()
        .filter(|d| *d <= chrono::Duration::days(365))
        .unwrap_or_else(|| chrono::Duration::days(365))
}

impl Scheduler {
    /// Create a scheduler for the keys in `store`.
    ///
    /// `max_concurrent_fetches` is read once here.
    pub fn new(store: ConfigStore, registry: Arc<ProviderRegistry>, cache: Arc<QuoteCache>) -> Self {
        let config = store.current();
        let states = DashMap::new();
        for key in &config.symbols {
            states.insert(key.clone(), KeyState::default());
        }

        Self {
            inner: Arc::new(Inner {
                permits: Arc::new(Semaphore::new(config.max_concurrent_fetches)),
                known: Mutex::new(config.key_set()),
                states,
                store,
                registry,
                cache,
                next_ticket: AtomicU64::new(1),
                wake: Notify::new(),
            }),
        }
    }

    /// Run one tick at `now` and return the handles of dispatched fetches.
    ///
    /// The tick itself never waits for a fetch.
    pub fn tick_at(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        let config = self.inner.store.current();

        let swept = self.inner.cache.sweep_at(now, config.cache.sweep_factor);
        if swept > 0 {
            debug!(swept, "swept expired cache entries");
        }
        self.watchdog(now, &config);

        config
            .symbols
            .iter()
            .filter_map(|key| self.dispatch(key, &config, now))
            .collect()
    }

    fn dispatch(&self, key: &FetchKey, config: &Configuration, now: DateTime<Utc>) -> Option<JoinHandle<()>> {
        let Some(provider) = self.inner.registry.get(key.provider()) else {
            warn!(key = %key, "no provider registered for key");
            return None;
        };

        let ticket = {
            // Only keys registered by new/reconcile have state; a missing
            // entry means the key was retired after this tick read its config.
            let mut state = self.inner.states.get_mut(key)?;
            match state.phase {
                Phase::Fetching { .. } => return None,
                Phase::Backoff { until } if now < until => return None,
                Phase::Backoff { .. } => {
                    debug!(key = %key, failures = state.failures, "backoff elapsed");
                    state.phase = Phase::Idle;
                }
                Phase::Idle => {}
            }

            if self
                .inner
                .cache
                .entry(key)
                .is_some_and(|entry| entry.is_fresh_at(now))
            {
                return None;
            }

            let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
            state.phase = Phase::Fetching { ticket, started: None };
            ticket
        };

        let inner = Arc::clone(&self.inner);
        let key = key.clone();
        let timeout = config.fetch_timeout();
        let started = Instant::now();
        debug!(key = %key, ticket, "dispatching fetch");

        Some(tokio::spawn(async move {
            let Ok(_permit) = Arc::clone(&inner.permits).acquire_owned().await else {
                return;
            };
            if !inner.begin(&key, ticket, now + to_chrono(started.elapsed())) {
                return;
            }
            let result = match tokio::time::timeout(timeout, provider.fetch(key.instrument(), timeout)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(timeout)),
            };
            let finished = now + to_chrono(started.elapsed());
            inner.complete(&key, ticket, result, finished);
        }))
    }

    /// Move keys stuck in `Fetching` past their deadline into backoff.
    fn watchdog(&self, now: DateTime<Utc>, config: &Configuration) {
        let deadline = to_chrono(config.fetch_timeout().saturating_add(WATCHDOG_GRACE));

        for mut item in self.inner.states.iter_mut() {
            let since = match item.phase {
                Phase::Fetching {
                    started: Some(since), ..
                } => since,
                _ => continue,
            };
            if now - since <= deadline {
                continue;
            }
            let state = item.value_mut();
            state.failures = state.failures.saturating_add(1);
            let delay = config.backoff.delay(state.failures);
            state.phase = Phase::Backoff {
                until: now + to_chrono(delay),
            };
            warn!(
                key = %item.key(),
                failures = item.failures,
                backoff_secs = delay.as_secs(),
                "fetch exceeded deadline; backing off"
            );
        }
    }

    /// Align the state map and cache with `config`'s key set.
    ///
    /// Idempotent: applying the same configuration twice changes nothing.
    pub fn reconcile(&self, config: &Configuration) -> ReconcileReport {
        let active = config.key_set();
        let mut known = self.inner.known.lock();

        let removed: Vec<FetchKey> = known.difference(&active).cloned().collect();
        let added: Vec<FetchKey> = config
            .symbols
            .iter()
            .filter(|k| !known.contains(*k))
            .cloned()
            .collect();

        for key in &removed {
            self.inner.states.remove(key);
        }
        for key in &added {
            self.inner.states.entry(key.clone()).or_default();
        }
        *known = active;

        let invalidated = self.inner.cache.invalidate(&known);
        self.inner.cache.set_history_policy(history_policy(config));
        drop(known);

        if !added.is_empty() {
            self.inner.wake.notify_one();
        }

        let report = ReconcileReport {
            added,
            removed,
            invalidated,
        };
        if !report.is_empty() {
            info!(
                added = report.added.len(),
                removed = report.removed.len(),
                invalidated = report.invalidated.len(),
                "active keys updated"
            );
        }
        report
    }

    /// Request a tick without waiting for the interval.
    pub fn wake(&self) {
        self.inner.wake.notify_one();
    }

    /// Tick loop. Returns once `shutdown` becomes true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut config_rx = self.inner.store.subscribe();
        info!("scheduler started");

        loop {
            // Dispatched fetches run detached
            let _ = self.tick_at(Utc::now());
            let interval = self.inner.store.current().update_interval();

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.inner.wake.notified() => {
                    debug!("immediate tick requested");
                }
                res = config_rx.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("scheduler stopped");
    }

    /// State of `key`, `None` if it is not active.
    pub fn key_status(&self, key: &FetchKey) -> Option<KeyStatus> {
        self.inner.states.get(key).map(|s| KeyStatus::from(&*s))
    }

    /// Number of keys with a fetch in flight.
    pub fn in_flight(&self) -> usize {
        self.inner
            .states
            .iter()
            .filter(|s| matches!(s.phase, Phase::Fetching { .. }))
            .count()
    }
}

impl Inner {
    /// Stamp the start of fetch `ticket`. False if the key moved on while
    /// the fetch was queued, in which case it must not run.
    fn begin(&self, key: &FetchKey, ticket: u64, at: DateTime<Utc>) -> bool {
        let Some(mut state) = self.states.get_mut(key) else {
            return false;
        };
        match &mut state.phase {
            Phase::Fetching { ticket: current, started } if *current == ticket => {
                *started = Some(at);
                true
            }
            _ => {
                debug!(key = %key, ticket, "dropping queued fetch");
                false
            }
        }
    }

    fn complete(&self, key: &FetchKey, ticket: u64, result: Result<QuoteRecord, FetchError>, now: DateTime<Utc>) {
        let Some(mut state) = self.states.get_mut(key) else {
            debug!(key = %key, ticket, "discarding result for retired key");
            return;
        };
        match state.phase {
            Phase::Fetching { ticket: current, .. } if current == ticket => {}
            _ => {
                debug!(key = %key, ticket, "discarding superseded result");
                return;
            }
        }

        let config = self.store.current();
        match result {
            Ok(record) => {
                debug!(key = %key, value = record.value, "fetch succeeded");
                self.cache.put(key.clone(), record, config.ttl_for(key.provider()));
                state.failures = 0;
                state.phase = Phase::Idle;
            }
            Err(err) => {
                state.failures = state.failures.saturating_add(1);
                let delay = config.backoff.delay(state.failures);
                state.phase = Phase::Backoff {
                    until: now + to_chrono(delay),
                };
                warn!(
                    key = %key,
                    kind = err.kind(),
                    error = %err,
                    failures = state.failures,
                    backoff_secs = delay.as_secs(),
                    "fetch failed; backing off"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::KeyPhase;
    use async_trait::async_trait;
    use quotebar_core::traits::Provider;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    enum Step {
        Value(f64),
        Fail,
        Slow(Duration, f64),
    }

    /// Provider that replays scripted steps and tracks concurrency.
    #[derive(Default)]
    struct Scripted {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        async fn fetch(&self, id: &str, _timeout: Duration) -> Result<QuoteRecord, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);

            let step = self.steps.lock().pop_front().unwrap_or(Step::Value(1.0));
            let result = match step {
                Step::Value(v) => Ok(QuoteRecord::new(id, id, v, 0.0)),
                Step::Fail => Err(FetchError::Network("scripted failure".into())),
                Step::Slow(delay, v) => {
                    tokio::time::sleep(delay).await;
                    Ok(QuoteRecord::new(id, id, v, 0.0))
                }
            };

            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn setup(symbols: &[&str], provider: Arc<Scripted>) -> (Scheduler, ConfigStore, Arc<QuoteCache>) {
        let config = Configuration {
            symbols: symbols.iter().map(|s| format!("mock:{}", s).parse().unwrap()).collect(),
            fetch_timeout_seconds: 1,
            ..Default::default()
        };
        let store = ConfigStore::new(config);
        let mut registry = ProviderRegistry::new();
        registry.register(provider);
        let cache = Arc::new(QuoteCache::default());
        let scheduler = Scheduler::new(store.clone(), Arc::new(registry), Arc::clone(&cache));
        (scheduler, store, cache)
    }

    fn key(s: &str) -> FetchKey {
        FetchKey::new("mock", s)
    }

    async fn join(handles: Vec<JoinHandle<()>>) {
        for handle in handles {
            handle.await.unwrap();
        }
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    /// Let spawned fetches run up to their first await.
    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_success_populates_cache() {
        let provider = Scripted::new(vec![Step::Value(1426.0)]);
        let (scheduler, _store, cache) = setup(&["a"], provider);

        join(scheduler.tick_at(Utc::now())).await;

        let (record, fresh) = cache.get(&key("a")).unwrap();
        assert_eq!(record.value, 1426.0);
        assert!(fresh);
        let status = scheduler.key_status(&key("a")).unwrap();
        assert_eq!(status.phase, KeyPhase::Idle);
        assert_eq!(status.failures, 0);
    }

    #[tokio::test]
    async fn test_single_fetch_in_flight() {
        let provider = Scripted::new(vec![Step::Slow(Duration::from_millis(100), 1.0)]);
        let (scheduler, _store, _cache) = setup(&["a"], Arc::clone(&provider));
        let now = Utc::now();

        let first = scheduler.tick_at(now);
        assert_eq!(first.len(), 1);
        assert_eq!(scheduler.in_flight(), 1);

        for _ in 0..3 {
            assert!(scheduler.tick_at(now).is_empty());
        }
        join(first).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.peak.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_fresh_entry_not_refetched() {
        let provider = Scripted::new(vec![]);
        let (scheduler, _store, _cache) = setup(&["a"], Arc::clone(&provider));
        let now = Utc::now();

        join(scheduler.tick_at(now)).await;
        assert!(scheduler.tick_at(now + secs(30)).is_empty());

        join(scheduler.tick_at(now + secs(61))).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_cache_and_backs_off() {
        let provider = Scripted::new(vec![Step::Value(10.0), Step::Fail, Step::Fail]);
        let (scheduler, _store, cache) = setup(&["a"], provider);
        let t0 = Utc::now();

        join(scheduler.tick_at(t0)).await;
        let before = cache.entry(&key("a")).unwrap();

        // stale, so this tick refetches and fails
        join(scheduler.tick_at(t0 + secs(61))).await;
        let after = cache.entry(&key("a")).unwrap();
        assert!(Arc::ptr_eq(&before, &after));

        let status = scheduler.key_status(&key("a")).unwrap();
        assert_eq!(status.phase, KeyPhase::Backoff);
        assert_eq!(status.failures, 1);

        // inside the 10s window
        assert!(scheduler.tick_at(t0 + secs(65)).is_empty());

        // window elapsed; second failure doubles the delay
        join(scheduler.tick_at(t0 + secs(72))).await;
        let status = scheduler.key_status(&key("a")).unwrap();
        assert_eq!(status.failures, 2);
        let until = status.backoff_until.unwrap();
        assert!(until >= t0 + secs(92) && until < t0 + secs(93));
    }

    #[tokio::test]
    async fn test_success_clears_failures() {
        let provider = Scripted::new(vec![Step::Fail, Step::Value(3.0)]);
        let (scheduler, _store, cache) = setup(&["a"], provider);
        let t0 = Utc::now();

        join(scheduler.tick_at(t0)).await;
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(scheduler.key_status(&key("a")).unwrap().failures, 1);

        join(scheduler.tick_at(t0 + secs(11))).await;
        let status = scheduler.key_status(&key("a")).unwrap();
        assert_eq!(status.phase, KeyPhase::Idle);
        assert_eq!(status.failures, 0);
        assert_eq!(cache.get(&key("a")).unwrap().0.value, 3.0);
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let provider = Scripted::new(vec![
            Step::Value(5.0),
            Step::Slow(Duration::from_secs(30), 6.0),
        ]);
        let (scheduler, _store, cache) = setup(&["a"], provider);
        let t0 = Utc::now();

        join(scheduler.tick_at(t0)).await;
        // fetch_timeout is 1s
        join(scheduler.tick_at(t0 + secs(61))).await;

        let status = scheduler.key_status(&key("a")).unwrap();
        assert_eq!(status.phase, KeyPhase::Backoff);
        assert_eq!(cache.get_at(&key("a"), t0 + secs(61)).unwrap().0.value, 5.0);
        assert!(scheduler.tick_at(t0 + secs(63)).is_empty());
    }

    #[tokio::test]
    async fn test_watchdog_reclaims_stuck_fetch() {
        let provider = Scripted::new(vec![Step::Slow(Duration::from_secs(3600), 1.0)]);
        let (scheduler, _store, _cache) = setup(&["a"], provider);
        let t0 = Utc::now();

        let handles = scheduler.tick_at(t0);
        assert_eq!(scheduler.key_status(&key("a")).unwrap().phase, KeyPhase::Fetching);
        settle().await;

        // timeout 1s + grace 5s not yet exceeded
        assert!(scheduler.tick_at(t0 + secs(5)).is_empty());
        assert_eq!(scheduler.key_status(&key("a")).unwrap().phase, KeyPhase::Fetching);

        assert!(scheduler.tick_at(t0 + secs(7)).is_empty());
        let status = scheduler.key_status(&key("a")).unwrap();
        assert_eq!(status.phase, KeyPhase::Backoff);
        assert_eq!(status.failures, 1);

        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn test_huge_fetch_timeout_does_not_overflow() {
        let provider = Scripted::new(vec![Step::Slow(Duration::from_secs(3600), 1.0)]);
        let (scheduler, store, _cache) = setup(&["a"], provider);
        let mut next = (*store.current()).clone();
        next.fetch_timeout_seconds = u64::MAX;
        next.backoff.max_seconds = u64::MAX;
        assert!(next.validate().is_ok());
        store.replace(next);
        let t0 = Utc::now();

        let handles = scheduler.tick_at(t0);
        settle().await;
        assert!(scheduler.tick_at(t0 + chrono::Duration::days(300)).is_empty());
        assert_eq!(scheduler.key_status(&key("a")).unwrap().phase, KeyPhase::Fetching);

        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_fetch_not_charged_by_watchdog() {
        let provider = Scripted::new(vec![
            Step::Slow(Duration::from_secs(3600), 1.0),
            Step::Value(2.0),
        ]);
        let config = Configuration {
            symbols: vec![key("a"), key("b")],
            fetch_timeout_seconds: 10,
            max_concurrent_fetches: 1,
            ..Default::default()
        };
        let store = ConfigStore::new(config);
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::clone(&provider) as Arc<dyn Provider>);
        let cache = Arc::new(QuoteCache::default());
        let scheduler = Scheduler::new(store, Arc::new(registry), Arc::clone(&cache));
        let t0 = Utc::now();

        // a holds the only permit and hangs; b waits for it
        let handles = scheduler.tick_at(t0);
        assert_eq!(handles.len(), 2);
        settle().await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        // past timeout + grace: only the running fetch is reclaimed
        assert!(scheduler.tick_at(t0 + secs(20)).is_empty());
        let a = scheduler.key_status(&key("a")).unwrap();
        assert_eq!(a.phase, KeyPhase::Backoff);
        assert_eq!(a.failures, 1);
        let b = scheduler.key_status(&key("b")).unwrap();
        assert_eq!(b.phase, KeyPhase::Fetching);
        assert_eq!(b.failures, 0);

        // a's hard timeout frees the permit and b runs
        join(handles).await;
        let b = scheduler.key_status(&key("b")).unwrap();
        assert_eq!(b.phase, KeyPhase::Idle);
        assert_eq!(b.failures, 0);
        assert_eq!(cache.get(&key("b")).unwrap().0.value, 2.0);
    }

    #[tokio::test]
    async fn test_reconcile_drops_removed_keys() {
        let provider = Scripted::new(vec![]);
        let (scheduler, store, cache) = setup(&["a", "b"], provider);

        join(scheduler.tick_at(Utc::now())).await;
        assert!(cache.contains(&key("b")));

        let mut next = (*store.current()).clone();
        next.symbols = vec![key("a"), key("c")];
        store.replace(next.clone());

        let report = scheduler.reconcile(&next);
        assert_eq!(report.removed, vec![key("b")]);
        assert_eq!(report.added, vec![key("c")]);
        assert_eq!(report.invalidated, vec![key("b")]);
        assert!(!cache.contains(&key("b")));
        assert!(scheduler.key_status(&key("b")).is_none());
        assert_eq!(scheduler.key_status(&key("c")).unwrap().phase, KeyPhase::Idle);

        assert!(scheduler.reconcile(&next).is_empty());
    }

    #[tokio::test]
    async fn test_late_completion_for_removed_key_is_dropped() {
        let provider = Scripted::new(vec![Step::Slow(Duration::from_millis(100), 1.0)]);
        let (scheduler, store, cache) = setup(&["b"], provider);

        let handles = scheduler.tick_at(Utc::now());

        let mut next = (*store.current()).clone();
        next.symbols = vec![];
        store.replace(next.clone());
        scheduler.reconcile(&next);

        join(handles).await;
        assert!(!cache.contains(&key("b")));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let provider = Scripted::new(vec![]);
        let (scheduler, _store, cache) = setup(&["a"], provider);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(scheduler.clone().run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.contains(&key("a")));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

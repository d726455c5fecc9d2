//! Quote cache.
//!
//! Entries are immutable `Arc` snapshots held in a `DashMap`. A put swaps
//! the whole entry under the key's shard lock, so readers always see either
//! the previous entry or the new one.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use quotebar_core::types::{ChartPoint, FetchKey, QuoteRecord, SampleSeries};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::history::HistoryPolicy;

/// A cached record together with its validity window.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub record: Arc<QuoteRecord>,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
    pub history: Arc<SampleSeries>,
}

impl CacheEntry {
    /// Fresh iff `now - fetched_at < ttl`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.age_at(now) < self.ttl
    }

    /// Age at `now`. A timestamp in the future counts as zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// True once the entry has outlived `factor` times its ttl.
    pub fn is_expired_at(&self, now: DateTime<Utc>, factor: u32) -> bool {
        self.age_at(now) >= self.ttl.saturating_mul(factor)
    }
}

/// Concurrent, time-bounded quote cache.
pub struct QuoteCache {
    entries: DashMap<FetchKey, Arc<CacheEntry>>,
    history: RwLock<HistoryPolicy>,
}

impl QuoteCache {
    /// Create a new cache.
    pub fn new(history: HistoryPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            history: RwLock::new(history),
        }
    }

    /// Replace the history policy used by subsequent puts.
    pub fn set_history_policy(&self, policy: HistoryPolicy) {
        *self.history.write() = policy;
    }

    /// Get the latest record and whether it is still fresh.
    pub fn get(&self, key: &FetchKey) -> Option<(Arc<QuoteRecord>, bool)> {
        self.get_at(key, Utc::now())
    }

    /// Same as [`get`](Self::get) with an explicit clock.
    pub fn get_at(&self, key: &FetchKey, now: DateTime<Utc>) -> Option<(Arc<QuoteRecord>, bool)> {
        self.entry(key)
            .map(|entry| (Arc::clone(&entry.record), entry.is_fresh_at(now)))
    }

    /// Get the whole entry snapshot.
    pub fn entry(&self, key: &FetchKey) -> Option<Arc<CacheEntry>> {
        self.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    /// Store a record, replacing any existing entry for the key.
    pub fn put(&self, key: FetchKey, record: QuoteRecord, ttl: Duration) {
        let policy = *self.history.read();
        let fetched_at = record.fetched_at;
        let build = |record: QuoteRecord, history: SampleSeries| {
            Arc::new(CacheEntry {
                record: Arc::new(record),
                fetched_at,
                ttl,
                history: Arc::new(history),
            })
        };

        match self.entries.entry(key) {
            Entry::Occupied(mut slot) => {
                let history = policy.next_series(Some(&slot.get().history), &record);
                slot.insert(build(record, history));
            }
            Entry::Vacant(slot) => {
                let history = policy.next_series(None, &record);
                slot.insert(build(record, history));
            }
        }
    }

    /// Insert a restored entry unless the key is already cached.
    pub(crate) fn restore(&self, key: FetchKey, record: QuoteRecord, ttl: Duration, history: Vec<ChartPoint>) -> bool {
        let policy = *self.history.read();
        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let fetched_at = record.fetched_at;
                slot.insert(Arc::new(CacheEntry {
                    history: Arc::new(policy.restore_series(history, fetched_at)),
                    record: Arc::new(record),
                    fetched_at,
                    ttl,
                }));
                true
            }
        }
    }

    /// Current entries, in no particular order.
    pub(crate) fn snapshot_entries(&self) -> Vec<(FetchKey, Arc<CacheEntry>)> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }

    /// Remove one key.
    pub fn remove(&self, key: &FetchKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry whose key is not in `active`. Returns the removed keys.
    pub fn invalidate(&self, active: &HashSet<FetchKey>) -> Vec<FetchKey> {
        let stale: Vec<FetchKey> = self
            .entries
            .iter()
            .filter(|e| !active.contains(e.key()))
            .map(|e| e.key().clone())
            .collect();

        for key in &stale {
            self.entries.remove(key);
            debug!(key = %key, "invalidated cache entry");
        }
        stale
    }

    /// Remove entries older than `factor` times their ttl.
    pub fn sweep(&self, factor: u32) -> usize {
        self.sweep_at(Utc::now(), factor)
    }

    /// Same as [`sweep`](Self::sweep) with an explicit clock.
    pub fn sweep_at(&self, now: DateTime<Utc>, factor: u32) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let keep = !entry.is_expired_at(now, factor);
            if !keep {
                debug!(key = %key, "swept expired cache entry");
            }
            keep
        });
        before.saturating_sub(self.entries.len())
    }

    /// Chart samples for a key, oldest first. `None` when nothing has
    /// accumulated yet.
    pub fn history(&self, key: &FetchKey) -> Option<Vec<ChartPoint>> {
        self.entry(key)
            .filter(|e| !e.history.is_empty())
            .map(|e| e.history.to_vec())
    }

    pub fn contains(&self, key: &FetchKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys currently cached, in no particular order.
    pub fn keys(&self) -> Vec<FetchKey> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Clear all cached data.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new(HistoryPolicy::default())
    }
}

//! On-disk snapshot of the cache.
//!
//! Restored entries keep their original `fetched_at`, so they come back
//! stale and are refetched on the first tick while still being displayed.

use quotebar_core::types::{ChartPoint, FetchKey, QuoteRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::cache::QuoteCache;

const FORMAT_VERSION: u32 = 1;

/// Errors while saving or restoring a snapshot.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed cache file: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Unsupported cache file version {0}")]
    Version(u32),
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: FetchKey,
    record: QuoteRecord,
    ttl_seconds: u64,
    #[serde(default)]
    history: Vec<ChartPoint>,
}

impl QuoteCache {
    /// Write every entry to `path`. The file is replaced atomically.
    pub fn save_to(&self, path: &Path) -> Result<usize, PersistError> {
        let mut entries: Vec<StoredEntry> = self
            .snapshot_entries()
            .into_iter()
            .map(|(key, entry)| StoredEntry {
                key,
                record: (*entry.record).clone(),
                ttl_seconds: entry.ttl.as_secs(),
                history: entry.history.to_vec(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));
        let count = entries.len();

        let body = serde_json::to_vec(&Snapshot {
            version: FORMAT_VERSION,
            entries,
        })?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;

        debug!(path = %path.display(), entries = count, "cache saved");
        Ok(count)
    }

    /// Restore entries for `active` keys from `path`.
    ///
    /// A missing file restores nothing. Keys already cached are left alone.
    pub fn load_from(&self, path: &Path, active: &HashSet<FetchKey>) -> Result<usize, PersistError> {
        let body = match std::fs::read(path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_slice(&body)?;
        if snapshot.version != FORMAT_VERSION {
            return Err(PersistError::Version(snapshot.version));
        }

        let mut restored = 0;
        for stored in snapshot.entries {
            if !active.contains(&stored.key) {
                continue;
            }
            let ttl = Duration::from_secs(stored.ttl_seconds);
            if self.restore(stored.key, stored.record, ttl, stored.history) {
                restored += 1;
            }
        }

        debug!(path = %path.display(), restored, "cache restored");
        Ok(restored)
    }
}

//! Configuration file change detection.
//!
//! Polls the file's modification time and length. A change is reported
//! once the file has stayed the same for the debounce period, so an editor
//! writing in several steps produces a single notification.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

async fn fingerprint(path: &Path) -> Option<Fingerprint> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some(Fingerprint {
        modified: meta.modified().ok(),
        len: meta.len(),
    })
}

/// Polling watcher for one configuration file.
#[derive(Debug, Clone)]
pub struct ConfigWatcher {
    path: PathBuf,
    poll: Duration,
    debounce: Duration,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>, poll: Duration) -> Self {
        Self {
            path: path.into(),
            poll,
            debounce: Duration::from_millis(500),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Poll until `shutdown` flips to true, sending one message per settled
    /// change.
    pub async fn run(self, changes: mpsc::Sender<PathBuf>, mut shutdown: watch::Receiver<bool>) {
        let mut last = fingerprint(&self.path).await;
        let mut missing_reported = false;
        let mut ticker = tokio::time::interval(self.poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let current = fingerprint(&self.path).await;
            if current.is_none() {
                if !missing_reported {
                    warn!(path = %self.path.display(), "config file is missing; keeping current configuration");
                    missing_reported = true;
                }
                continue;
            }
            missing_reported = false;
            if current == last {
                continue;
            }

            let settled = self.settle(current).await;
            last = settled;
            debug!(path = %self.path.display(), "config file changed");
            if changes.send(self.path.clone()).await.is_err() {
                break;
            }
        }
    }

    /// Wait until the fingerprint stops moving.
    async fn settle(&self, mut seen: Option<Fingerprint>) -> Option<Fingerprint> {
        loop {
            tokio::time::sleep(self.debounce).await;
            let now = fingerprint(&self.path).await;
            if now == seen {
                return now;
            }
            seen = now;
        }
    }
}

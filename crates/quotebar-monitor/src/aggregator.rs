//! Composition of cached records into the display line.

use chrono::{DateTime, Utc};
use quotebar_cache::QuoteCache;
use quotebar_config::{Configuration, DisplayMode};
use quotebar_core::types::FetchKey;
use tracing::trace;

use crate::fragment::{render_fragment, FragmentStyle};

/// Shown when there is nothing to display.
pub const PLACEHOLDER: &str = "--";

/// Renders the display line from a configuration and the cache.
///
/// Rendering only reads `Arc` snapshots and never waits on fetches.
pub struct Aggregator<'a> {
    config: &'a Configuration,
    cache: &'a QuoteCache,
}

impl<'a> Aggregator<'a> {
    pub fn new(config: &'a Configuration, cache: &'a QuoteCache) -> Self {
        Self { config, cache }
    }

    /// Render the line for the given rotation counter and clock.
    pub fn render(&self, rotation_index: usize, now: DateTime<Utc>) -> String {
        let symbols = &self.config.symbols;
        if symbols.is_empty() {
            return PLACEHOLDER.to_string();
        }

        let rendered = match self.config.display_mode {
            DisplayMode::Single => {
                let key = self.config.primary_symbol.as_ref().unwrap_or(&symbols[0]);
                self.fragment(key, now)
            }
            DisplayMode::Rotate => self.fragment(&symbols[rotation_index % symbols.len()], now),
            DisplayMode::Multi => {
                let parts: Vec<String> = symbols
                    .iter()
                    .filter_map(|key| self.fragment(key, now))
                    .take(self.config.max_multi)
                    .collect();
                (!parts.is_empty()).then(|| parts.join(&self.config.separator))
            }
        };

        rendered.unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    /// Fragment for one key, `None` if it has never been fetched.
    pub fn fragment(&self, key: &FetchKey, now: DateTime<Utc>) -> Option<String> {
        let entry = self.cache.entry(key)?;
        let overdue = entry.ttl.saturating_mul(self.config.cache.degraded_factor);
        let age = entry.age_at(now);
        let degraded = age > overdue;
        if degraded {
            trace!(key = %key, age_secs = age.as_secs(), "rendering degraded record");
        }

        let style = FragmentStyle {
            flat_band: self.config.flat_band,
            use_color: self.config.use_color,
        };
        Some(render_fragment(
            &self.config.display_format,
            key,
            &entry.record,
            style,
            degraded,
        ))
    }
}

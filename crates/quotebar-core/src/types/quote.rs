//! Normalized quote records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ChartPoint;

/// Percent-point band around zero treated as unchanged.
pub const DEFAULT_FLAT_BAND: f64 = 0.005;

/// Direction of the latest move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Flat,
}

impl Trend {
    /// Classify a percent change. Anything inside `±flat_band` (and NaN)
    /// is flat.
    pub fn from_change(change_percent: f64, flat_band: f64) -> Self {
        if change_percent.is_nan() || change_percent.abs() < flat_band.abs() {
            Trend::Flat
        } else if change_percent > 0.0 {
            Trend::Up
        } else {
            Trend::Down
        }
    }

    /// Colored marker shown in front of a quote. Red is up, green is down,
    /// following mainland market convention.
    pub fn marker(&self) -> &'static str {
        match self {
            Trend::Up => "🔴📈",
            Trend::Down => "🟢📉",
            Trend::Flat => "⚪️➡️",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        };
        write!(f, "{}", s)
    }
}

/// A normalized reading from any provider.
///
/// Records are never mutated once they are handed to the cache; a new fetch
/// produces a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    /// Instrument identifier as requested
    pub instrument_id: String,
    /// Human readable name
    pub display_name: String,
    /// Latest value
    pub value: f64,
    /// Change versus the reference value, in percent
    pub change_percent: f64,
    /// Direction implied by `change_percent`
    pub trend: Trend,
    /// When the value was fetched
    pub fetched_at: DateTime<Utc>,
    /// Unit suffix such as `%` or `°C`
    pub unit: Option<String>,
    /// Textual payload for non-numeric readings
    pub detail: Option<String>,
    /// Provider-supplied history, oldest first
    pub history: Option<Vec<ChartPoint>>,
}

impl QuoteRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        instrument_id: impl Into<String>,
        display_name: impl Into<String>,
        value: f64,
        change_percent: f64,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            display_name: display_name.into(),
            value,
            change_percent,
            trend: Trend::from_change(change_percent, DEFAULT_FLAT_BAND),
            fetched_at: Utc::now(),
            unit: None,
            detail: None,
            history: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ChartPoint>) -> Self {
        self.history = Some(history);
        self
    }

    /// Override the fetch timestamp.
    pub fn fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = at;
        self
    }

    /// Age of the record at `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }
}

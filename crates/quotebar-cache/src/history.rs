//! Chart history retention.

use chrono::{DateTime, Duration, Utc};
use quotebar_core::types::{ChartPoint, QuoteRecord, SampleSeries};

/// How much history is kept per key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPolicy {
    /// Maximum number of samples (0 = unlimited)
    pub max_samples: usize,
    /// Samples older than this, relative to the newest, are dropped
    pub window: Duration,
}

impl HistoryPolicy {
    pub fn new(max_samples: usize, window: Duration) -> Self {
        Self { max_samples, window }
    }

    /// Build the series that follows `previous` once `record` is stored.
    ///
    /// Provider-supplied history replaces what was accumulated so far;
    /// otherwise the record's value is appended as a new sample.
    pub(crate) fn next_series(
        &self,
        previous: Option<&SampleSeries>,
        record: &QuoteRecord,
    ) -> SampleSeries {
        let mut series = match (&record.history, previous) {
            (Some(points), _) => {
                let mut fresh = SampleSeries::with_capacity(self.max_samples);
                fresh.extend(points.iter().copied());
                fresh
            }
            (None, Some(prev)) if prev.capacity() == self.max_samples => prev.clone(),
            (None, Some(prev)) => {
                let mut resized = SampleSeries::with_capacity(self.max_samples);
                resized.extend(prev.iter().copied());
                resized
            }
            (None, None) => SampleSeries::with_capacity(self.max_samples),
        };

        if record.history.is_none() && record.value.is_finite() {
            series.push(ChartPoint::new(record.fetched_at, record.value));
        }
        self.prune(&mut series, record.fetched_at);
        series
    }

    /// Rebuild a stored series under this policy.
    pub(crate) fn restore_series(&self, points: Vec<ChartPoint>, newest: DateTime<Utc>) -> SampleSeries {
        let mut series = SampleSeries::with_capacity(self.max_samples);
        series.extend(points);
        self.prune(&mut series, newest);
        series
    }

    fn prune(&self, series: &mut SampleSeries, newest: DateTime<Utc>) {
        if self.window > Duration::zero() {
            series.prune_before(newest - self.window);
        }
    }
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        // Three hours of samples at the default refresh rate
        Self {
            max_samples: 360,
            window: Duration::hours(3),
        }
    }
}

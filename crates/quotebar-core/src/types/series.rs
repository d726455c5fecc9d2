//! Chart sample series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One chart sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl ChartPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Time-ordered samples for one series, optimized for appends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSeries {
    /// Samples stored in a deque for efficient push/pop
    points: VecDeque<ChartPoint>,
    /// Maximum capacity (0 = unlimited)
    capacity: usize,
}

impl SampleSeries {
    /// Create a new empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a series with a maximum capacity.
    /// When capacity is reached, oldest samples are removed.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample, removing the oldest if at capacity.
    ///
    /// A sample older than the newest one is dropped so the series stays
    /// ordered; a sample with the same timestamp replaces the newest.
    pub fn push(&mut self, point: ChartPoint) {
        if let Some(last) = self.points.back() {
            if point.timestamp < last.timestamp {
                return;
            }
            if point.timestamp == last.timestamp {
                self.points.pop_back();
            }
        }
        if self.capacity > 0 && self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Push multiple samples.
    pub fn extend(&mut self, points: impl IntoIterator<Item = ChartPoint>) {
        for point in points {
            self.push(point);
        }
    }

    /// Drop samples older than `cutoff`.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) {
        while self
            .points
            .front()
            .is_some_and(|p| p.timestamp < cutoff)
        {
            self.points.pop_front();
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the newest sample.
    pub fn last(&self) -> Option<&ChartPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter()
    }

    /// Copy the samples out, oldest first.
    pub fn to_vec(&self) -> Vec<ChartPoint> {
        self.points.iter().copied().collect()
    }

    /// Extract values as a vector.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

impl FromIterator<ChartPoint> for SampleSeries {
    fn from_iter<T: IntoIterator<Item = ChartPoint>>(iter: T) -> Self {
        let mut series = SampleSeries::new();
        series.extend(iter);
        series
    }
}

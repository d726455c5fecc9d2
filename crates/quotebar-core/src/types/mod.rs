//! Core data types for the quote bar.

mod key;
mod quote;
mod series;

pub use key::{FetchKey, DEFAULT_PROVIDER};
pub use quote::{QuoteRecord, Trend, DEFAULT_FLAT_BAND};
pub use series::{ChartPoint, SampleSeries};

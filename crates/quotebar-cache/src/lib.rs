//! Quote caching.

mod cache;
mod history;
mod persist;

pub use cache::{CacheEntry, QuoteCache};
pub use history::HistoryPolicy;
pub use persist::PersistError;

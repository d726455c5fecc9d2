//! Core types and traits for the quote bar.
//!
//! This crate provides the foundational building blocks including:
//! - Series identity (`FetchKey`) and normalized quote records
//! - Chart sample series
//! - The `Provider` capability implemented by every data source
//! - The error taxonomy shared by all crates

pub mod types;
pub mod traits;
pub mod error;

pub use error::{ConfigError, FetchError, QuotebarError, QuotebarResult};
pub use types::*;
pub use traits::*;

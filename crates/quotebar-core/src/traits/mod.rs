//! Core traits for the quote bar.

mod provider;

pub use provider::Provider;

//! Provider trait definitions.

use crate::error::FetchError;
use crate::types::QuoteRecord;
use async_trait::async_trait;
use std::time::Duration;

/// A source of quote records.
///
/// Implementations must be idempotent and must not keep partial state on
/// failure. The `timeout` is a budget for the whole call; callers also
/// enforce it from outside, so an implementation that overruns is simply
/// abandoned.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Fetch the current reading for one instrument.
    ///
    /// # Arguments
    /// * `instrument_id` - Provider-specific identifier (symbol, metric, city)
    /// * `timeout` - Upper bound for network I/O
    async fn fetch(&self, instrument_id: &str, timeout: Duration) -> Result<QuoteRecord, FetchError>;

    /// Registry name of this provider.
    fn name(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str {
        ""
    }

    /// Example instrument identifiers, for listings.
    fn examples(&self) -> &[&'static str] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl Provider for Fixed {
        async fn fetch(&self, instrument_id: &str, _timeout: Duration) -> Result<QuoteRecord, FetchError> {
            match instrument_id {
                "A" => Ok(QuoteRecord::new("A", "Alpha", 1.0, 0.0)),
                other => Err(FetchError::NotFound(other.to_string())),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_provider_as_trait_object() {
        let provider: Box<dyn Provider> = Box::new(Fixed);

        let record = provider.fetch("A", Duration::from_secs(1)).await.unwrap();
        assert_eq!(record.display_name, "Alpha");

        let err = provider.fetch("B", Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err, FetchError::NotFound("B".into()));
        assert_eq!(provider.description(), "");
    }
}

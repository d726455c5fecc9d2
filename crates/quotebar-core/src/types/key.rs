//! Series identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Provider used when a symbol is written without a `provider:` prefix.
pub const DEFAULT_PROVIDER: &str = "stock";

/// Identity of one monitored series: provider name plus instrument id.
///
/// The textual form is `provider:instrument`, e.g. `stock:600519` or
/// `system:cpu`. A bare instrument belongs to [`DEFAULT_PROVIDER`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FetchKey {
    provider: String,
    instrument: String,
}

impl FetchKey {
    /// Create a key from its two parts.
    pub fn new(provider: impl Into<String>, instrument: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            instrument: instrument.into(),
        }
    }

    /// Provider name.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Instrument identifier.
    pub fn instrument(&self) -> &str {
        &self.instrument
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.instrument)
    }
}

impl FromStr for FetchKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidKey {
            key: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let (provider, instrument) = match trimmed.split_once(':') {
            Some((provider, instrument)) => (provider.trim(), instrument.trim()),
            None => (DEFAULT_PROVIDER, trimmed),
        };

        if provider.is_empty() {
            return Err(invalid("missing provider name"));
        }
        if instrument.is_empty() {
            return Err(invalid("missing instrument id"));
        }
        if instrument.chars().any(char::is_whitespace) {
            return Err(invalid("instrument id contains whitespace"));
        }

        Ok(Self::new(provider.to_lowercase(), instrument))
    }
}

impl TryFrom<String> for FetchKey {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FetchKey> for String {
    fn from(key: FetchKey) -> Self {
        key.to_string()
    }
}

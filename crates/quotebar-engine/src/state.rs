//! Per-key refresh state.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a key is in its refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Phase {
    #[default]
    Idle,
    /// A fetch tagged `ticket` is dispatched. `started` is set once it
    /// holds a fetch permit; `None` while it waits in the queue.
    Fetching {
        ticket: u64,
        started: Option<DateTime<Utc>>,
    },
    /// Excluded from dispatch until `until`
    Backoff { until: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct KeyState {
    pub phase: Phase,
    /// Consecutive failures, cleared by the next success
    pub failures: u32,
}

/// Phase name exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPhase {
    Idle,
    Fetching,
    Backoff,
}

/// Diagnostic view of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyStatus {
    pub phase: KeyPhase,
    pub failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_until: Option<DateTime<Utc>>,
}

impl From<&KeyState> for KeyStatus {
    fn from(state: &KeyState) -> Self {
        let (phase, backoff_until) = match state.phase {
            Phase::Idle => (KeyPhase::Idle, None),
            Phase::Fetching { .. } => (KeyPhase::Fetching, None),
            Phase::Backoff { until } => (KeyPhase::Backoff, Some(until)),
        };
        Self {
            phase,
            failures: state.failures,
            backoff_until,
        }
    }
}

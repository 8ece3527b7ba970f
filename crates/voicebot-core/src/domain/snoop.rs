//! Snoop resource contract (§3, §4.3): the authoritative FSM for an audio tap.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// States of a snoop channel, in table order. Order is significant: it is
/// used to reject backwards transitions in [`SnoopContract::can_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SnoopState {
    Created,
    WaitingAst,
    Ready,
    Consumed,
    Releasable,
    Destroyed,
}

impl SnoopState {
    /// Default TTL for a contract parked in this state.
    #[must_use]
    pub const fn default_ttl(self) -> Duration {
        match self {
            Self::Created => Duration::from_secs(10),
            Self::WaitingAst => Duration::from_secs(10),
            Self::Ready => Duration::from_secs(120),
            Self::Consumed => Duration::from_secs(300),
            Self::Releasable => Duration::from_secs(30),
            Self::Destroyed => Duration::from_secs(5),
        }
    }
}

/// Persisted snoop contract (§3 "Snoop Contract").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnoopContract {
    pub linked_id: String,
    pub snoop_id: String,
    pub parent_channel_id: String,
    pub capture_bridge_id: Option<String>,
    pub external_media_id: Option<String>,
    pub state: SnoopState,
    pub created_at_ms: i64,
    pub ttl_ms: u64,
    pub version: u64,
}

/// Error raised by an illegal FSM transition.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SnoopTransitionError {
    #[error("forbidden transition from {from:?} to {to:?}")]
    Forbidden { from: SnoopState, to: SnoopState },
    #[error("regression from {from:?} to {to:?} is not permitted")]
    Regression { from: SnoopState, to: SnoopState },
}

impl SnoopContract {
    #[must_use]
    pub fn new(linked_id: impl Into<String>, snoop_id: impl Into<String>, parent_channel_id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            linked_id: linked_id.into(),
            snoop_id: snoop_id.into(),
            parent_channel_id: parent_channel_id.into(),
            capture_bridge_id: None,
            external_media_id: None,
            state: SnoopState::Created,
            created_at_ms: now_ms,
            ttl_ms: SnoopState::Created.default_ttl().as_millis() as u64,
            version: 0,
        }
    }

    /// Transition algorithm from §4.3.
    ///
    /// `expected_from` is the caller's belief about the current state; if it
    /// differs from `self.state` the *actual* state is used as the effective
    /// origin (event races are tolerated), but a regression relative to the
    /// actual state is still rejected. Idempotent (`target == self.state`)
    /// transitions are always a no-op success. Any state may transition to
    /// `Destroyed`.
    pub fn transition(&mut self, expected_from: SnoopState, target: SnoopState, now_ms: i64) -> Result<(), SnoopTransitionError> {
        let effective_from = self.state;
        let _ = expected_from; // documented input, actual state is authoritative per §4.3 step 2

        if target == effective_from {
            return Ok(());
        }

        if target == SnoopState::Destroyed {
            self.apply(target, now_ms);
            return Ok(());
        }

        if target < effective_from {
            return Err(SnoopTransitionError::Regression { from: effective_from, to: target });
        }

        if !Self::allowed(effective_from, target) {
            return Err(SnoopTransitionError::Forbidden { from: effective_from, to: target });
        }

        self.apply(target, now_ms);
        Ok(())
    }

    fn apply(&mut self, target: SnoopState, now_ms: i64) {
        self.state = target;
        self.created_at_ms = now_ms;
        self.ttl_ms = target.default_ttl().as_millis() as u64;
        self.version += 1;
    }

    /// `to ∈ allowed[from] ∪ {from} ∪ {DESTROYED}` (§8 property 9).
    #[must_use]
    pub fn allowed(from: SnoopState, to: SnoopState) -> bool {
        use SnoopState::{Consumed, Created, Destroyed, Ready, Releasable, WaitingAst};
        if to == from || to == Destroyed {
            return true;
        }
        matches!(
            (from, to),
            (Created, WaitingAst)
                | (Created, Ready) // idempotent READY reachable directly, tolerates event races
                | (WaitingAst, Ready)
                | (Ready, Consumed)
                | (Consumed, Releasable)
        )
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, SnoopState::Ready)
    }
}

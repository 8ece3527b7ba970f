//! Phase Manager (C4, §4.4).

use tracing::warn;
use voicebot_core::domain::{PhaseTable, Session};

/// Why a transition was requested, for logging only.
#[derive(Debug, Clone, Copy)]
pub struct TransitionReason(pub &'static str);

/// Drives phase transitions against the static [`PhaseTable`] (C4).
pub struct PhaseManager<'a> {
    table: &'a PhaseTable,
}

/// Outcome of a transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Same target as current phase: no-op.
    NoOp,
    /// Target applied.
    Applied,
    /// Target isn't in the table; applied anyway after a warning (§4.4).
    AppliedUnknown,
    /// Regression rejected; clamped to the current phase.
    ClampedToCurrent,
}

impl<'a> PhaseManager<'a> {
    #[must_use]
    pub const fn new(table: &'a PhaseTable) -> Self {
        Self { table }
    }

    /// `transition(session, next, {reason})` (§4.4).
    ///
    /// Idempotent: same target is a no-op. Unknown targets are permitted
    /// with a warning. Regressions not on the per-phase whitelist are
    /// clamped to the current phase rather than applied.
    pub fn transition(&self, session: &mut Session, next: &str, reason: TransitionReason) -> TransitionOutcome {
        if session.current_phase == next {
            return TransitionOutcome::NoOp;
        }

        if self.table.is_forbidden_regression(&session.current_phase, next) {
            warn!(
                call = %session.linked_id,
                from = %session.current_phase,
                to = %next,
                reason = reason.0,
                "phase regression rejected; clamping to current phase"
            );
            return TransitionOutcome::ClampedToCurrent;
        }

        if !self.table.contains(next) {
            warn!(call = %session.linked_id, to = %next, "transitioning into unregistered phase");
            session.current_phase = next.to_string();
            return TransitionOutcome::AppliedUnknown;
        }

        session.current_phase = next.to_string();
        TransitionOutcome::Applied
    }
}

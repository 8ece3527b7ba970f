//! Deep-Turn Identity Guard and Invalid-Complete Guard (C6, §4.5 step 6,
//! §4.9, §8 property 3: "no free-LLM fallback past turn 1 without a
//! captured identity").

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardViolation {
    #[error("turn {turn} past first turn without captured identity outside phase {capture_phase}")]
    UncapturedIdentityPastFirstTurn { turn: u32, capture_phase: String },
    #[error("reached {complete_phase} without a validated identity")]
    CompleteWithoutIdentity { complete_phase: String },
}

#[derive(Debug, Clone)]
pub struct DeepTurnGuard {
    pub capture_phase: String,
    pub complete_phase: String,
}

impl DeepTurnGuard {
    #[must_use]
    pub fn new(capture_phase: impl Into<String>, complete_phase: impl Into<String>) -> Self {
        Self { capture_phase: capture_phase.into(), complete_phase: complete_phase.into() }
    }

    /// Blocks a free-LLM fallback turn (anything not a static prompt) when
    /// `turn > 1 ∧ identity not yet captured ∧ phase ≠ capture_phase`. Such
    /// a turn would otherwise hand an unauthenticated caller a general
    /// conversational surface — this guard terminates the call instead.
    pub fn check_turn(&self, turn: u32, identity_captured: bool, phase: &str) -> Result<(), GuardViolation> {
        if turn > 1 && !identity_captured && phase != self.capture_phase {
            return Err(GuardViolation::UncapturedIdentityPastFirstTurn { turn, capture_phase: self.capture_phase.clone() });
        }
        Ok(())
    }

    /// Hard error if the phase manager would land the session in the
    /// terminal complete phase without a validated identity.
    pub fn check_complete(&self, phase: &str, identity_captured: bool) -> Result<(), GuardViolation> {
        if phase == self.complete_phase && !identity_captured {
            return Err(GuardViolation::CompleteWithoutIdentity { complete_phase: self.complete_phase.clone() });
        }
        Ok(())
    }
}

//! Phase table: the static registry of conversation phases (§3, §4.4).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a phase does to the turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseKind {
    /// Assistant speaks, no recording follows.
    Speak,
    /// The orchestrator records and transcribes user input.
    Listen,
    /// A transcript is being validated against a narrow grammar (STRICT mode).
    Validate,
    /// No playback, no listening — domain drives an immediate next iteration.
    Silent,
}

/// Entry in the static phase table.
///
/// Invariant: `requires_input` iff `kind == PhaseKind::Listen`. Constructors
/// enforce this instead of trusting callers to keep the two in sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub requires_input: bool,
    pub kind: PhaseKind,
}

impl Phase {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: PhaseKind) -> Self {
        Self {
            name: name.into(),
            requires_input: kind == PhaseKind::Listen,
            kind,
        }
    }

    #[must_use]
    pub const fn is_silent(&self) -> bool {
        matches!(self.kind, PhaseKind::Silent)
    }
}

/// Registry of phases plus the regression whitelist (§4.4).
///
/// Regression (moving to a phase whose table index is strictly smaller than
/// the current one) is forbidden unless the target is present in
/// `regression_whitelist` for the *current* phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseTable {
    order: Vec<String>,
    phases: HashMap<String, Phase>,
    /// current phase name -> set of phase names it may regress to.
    regression_whitelist: HashMap<String, Vec<String>>,
}

impl PhaseTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, phase: Phase) -> &mut Self {
        if !self.phases.contains_key(&phase.name) {
            self.order.push(phase.name.clone());
        }
        self.phases.insert(phase.name.clone(), phase);
        self
    }

    pub fn allow_regression(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.regression_whitelist
            .entry(from.into())
            .or_default()
            .push(to.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Phase> {
        self.phases.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.phases.contains_key(name)
    }

    /// Table index used for regression comparisons; unknown phases sort last.
    fn order_of(&self, name: &str) -> usize {
        self.order.iter().position(|n| n == name).unwrap_or(usize::MAX)
    }

    /// True if moving from `current` to `target` would be a regression
    /// (earlier in table order) that isn't explicitly whitelisted.
    #[must_use]
    pub fn is_forbidden_regression(&self, current: &str, target: &str) -> bool {
        if current == target {
            return false;
        }
        let regresses = self.order_of(target) < self.order_of(current);
        if !regresses {
            return false;
        }
        !self
            .regression_whitelist
            .get(current)
            .is_some_and(|allowed| allowed.iter().any(|p| p == target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PhaseTable {
        let mut t = PhaseTable::new();
        t.register(Phase::new("GREETING", PhaseKind::Speak));
        t.register(Phase::new("CAPTURE", PhaseKind::Listen));
        t.register(Phase::new("CONFIRM", PhaseKind::Listen));
        t.register(Phase::new("COMPLETE", PhaseKind::Speak));
        t.allow_regression("CONFIRM", "CAPTURE");
        t
    }

    #[test]
    fn requires_input_matches_kind() {
        let listen = Phase::new("x", PhaseKind::Listen);
        assert!(listen.requires_input);
        let speak = Phase::new("x", PhaseKind::Speak);
        assert!(!speak.requires_input);
    }

    #[test]
    fn forward_transition_is_never_a_regression() {
        let t = table();
        assert!(!t.is_forbidden_regression("CAPTURE", "CONFIRM"));
    }

    #[test]
    fn whitelisted_regression_is_allowed() {
        let t = table();
        assert!(!t.is_forbidden_regression("CONFIRM", "CAPTURE"));
    }

    #[test]
    fn non_whitelisted_regression_is_forbidden() {
        let t = table();
        assert!(t.is_forbidden_regression("COMPLETE", "GREETING"));
    }

    #[test]
    fn same_phase_is_idempotent_not_a_regression() {
        let t = table();
        assert!(!t.is_forbidden_regression("CONFIRM", "CONFIRM"));
    }
}

//! Lifecycle contract table: phase → allowed resource actions (§3, §4.3).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A resource-plane or domain-visible action the orchestrator may attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Play,
    Record,
    StartStt,
    StartMoh,
    Transfer,
    Teardown,
}

/// Entry in the lifecycle contract table (§3 "Lifecycle Contract Entry").
#[derive(Debug, Clone, Default)]
pub struct LifecycleContractEntry {
    pub allow: HashSet<Action>,
    pub deny: HashSet<Action>,
    pub requires: HashSet<&'static str>,
    pub teardown_allowed: bool,
    pub advance_turn_after_playback: bool,
}

impl LifecycleContractEntry {
    #[must_use]
    pub fn allowing(actions: impl IntoIterator<Item = Action>) -> Self {
        Self { allow: actions.into_iter().collect(), ..Self::default() }
    }

    #[must_use]
    pub fn deny(mut self, action: Action) -> Self {
        self.deny.insert(action);
        self
    }

    #[must_use]
    pub const fn with_teardown(mut self, allowed: bool) -> Self {
        self.teardown_allowed = allowed;
        self
    }

    #[must_use]
    pub const fn advancing_turn(mut self) -> Self {
        self.advance_turn_after_playback = true;
        self
    }
}

/// Table mapping phase name to its lifecycle contract entry, plus the
/// narrowly-scoped one-shot re-prompt exception markers consumed from the
/// session (§4.3: "a narrowly scoped exception ... the engine consumes and
/// deletes the marker").
#[derive(Debug, Clone, Default)]
pub struct LifecycleTable {
    entries: HashMap<String, LifecycleContractEntry>,
}

impl LifecycleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, phase: impl Into<String>, entry: LifecycleContractEntry) -> &mut Self {
        self.entries.insert(phase.into(), entry);
        self
    }

    /// `isActionAllowed(phase, action, oneShotMarker)` (§4.3).
    ///
    /// Phase unknown ⇒ deny. `deny` overrides `allow`. A one-shot marker
    /// (e.g. a previously-rejected webhook re-prompt) permits exactly the
    /// `Play` action even when the table would otherwise deny it; callers
    /// are responsible for deleting the marker after it is consumed.
    #[must_use]
    pub fn is_action_allowed(&self, phase: &str, action: Action, one_shot_reprompt: bool) -> bool {
        let Some(entry) = self.entries.get(phase) else {
            return false;
        };
        if entry.deny.contains(&action) {
            return one_shot_reprompt && action == Action::Play;
        }
        entry.allow.contains(&action)
    }

    #[must_use]
    pub fn teardown_allowed(&self, phase: &str) -> bool {
        self.entries.get(phase).is_some_and(|e| e.teardown_allowed)
    }

    #[must_use]
    pub fn advance_turn_after_playback(&self, phase: &str) -> bool {
        self.entries.get(phase).is_some_and(|e| e.advance_turn_after_playback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LifecycleTable {
        let mut t = LifecycleTable::new();
        t.register(
            "LISTEN",
            LifecycleContractEntry::allowing([Action::Play, Action::Record, Action::StartStt]).advancing_turn(),
        );
        t.register("SPEAK", LifecycleContractEntry::allowing([Action::Play]).deny(Action::StartStt));
        t
    }

    #[test]
    fn unknown_phase_denies_everything() {
        let t = table();
        assert!(!t.is_action_allowed("NOPE", Action::Play, false));
    }

    #[test]
    fn deny_overrides_allow() {
        let mut t = table();
        t.register("BOTH", LifecycleContractEntry::allowing([Action::Play]).deny(Action::Play));
        assert!(!t.is_action_allowed("BOTH", Action::Play, false));
    }

    #[test]
    fn one_shot_reprompt_unlocks_play_but_not_other_denied_actions() {
        let mut t = table();
        t.register("SILENT", LifecycleContractEntry::default().deny(Action::Play).deny(Action::StartStt));
        assert!(!t.is_action_allowed("SILENT", Action::Play, false));
        assert!(t.is_action_allowed("SILENT", Action::Play, true));
        // one-shot marker only ever unlocks Play, not other denied actions
        assert!(!t.is_action_allowed("SILENT", Action::StartStt, true));
    }

    #[test]
    fn listen_phase_allows_stt() {
        let t = table();
        assert!(t.is_action_allowed("LISTEN", Action::StartStt, false));
    }
}

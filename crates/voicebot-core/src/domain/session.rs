//! Session Context (§3 "Session", §4.8).
//!
//! A plain, single-threaded mutable struct: "exclusively owned by its turn
//! orchestrator; no concurrent mutation by other sessions" (§3). No
//! concurrency primitives are needed here — the orchestrator is the only
//! writer and it runs cooperatively.

use super::contract::BusinessState;
use serde::{Deserialize, Serialize};

/// One turn of conversation history (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub ts_ms: i64,
}

/// The last thing spoken in a given phase, used by the anti-replay guardrail
/// (§4.5, §6.c policies).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSpoken {
    pub phase: String,
    pub text: String,
}

/// One per call (§3 "Session").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub linked_id: String,
    pub caller: String,
    pub callee: String,
    pub bot_name: String,
    pub start_ts_ms: i64,
    pub end_ts_ms: Option<i64>,

    pub active: bool,
    pub terminated: bool,
    pub in_hold: bool,
    /// When the session entered hold (`now_ms` at the time), used to compute
    /// elapsed time for `HoldPolicy::should_exit` (§4.5 step 3, §4.6).
    pub hold_entered_at_ms: Option<i64>,

    pub turn: u32,
    pub consecutive_silences: u32,
    pub total_silences: u32,
    pub successful_turns: u32,

    pub history: Vec<Turn>,
    pub current_phase: String,
    pub last_spoken: Option<LastSpoken>,

    pub business_state: BusinessState,
}

impl Session {
    #[must_use]
    pub fn new(
        linked_id: impl Into<String>,
        caller: impl Into<String>,
        callee: impl Into<String>,
        bot_name: impl Into<String>,
        start_phase: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            linked_id: linked_id.into(),
            caller: caller.into(),
            callee: callee.into(),
            bot_name: bot_name.into(),
            start_ts_ms: now_ms,
            end_ts_ms: None,
            active: true,
            terminated: false,
            in_hold: false,
            hold_entered_at_ms: None,
            turn: 0,
            consecutive_silences: 0,
            total_silences: 0,
            successful_turns: 0,
            history: Vec::new(),
            current_phase: start_phase.into(),
            last_spoken: None,
            business_state: BusinessState::new(),
        }
    }

    pub fn reset_silence(&mut self) {
        self.consecutive_silences = 0;
    }

    pub fn increment_silence(&mut self) {
        self.consecutive_silences += 1;
        self.total_silences += 1;
    }

    pub fn mark_voice_detected(&mut self) {
        self.reset_silence();
        self.turn += 1;
        self.successful_turns += 1;
    }

    /// Idempotent: a second call leaves observable state unchanged (§8
    /// property 6).
    pub fn terminate(&mut self, now_ms: i64) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.active = false;
        self.end_ts_ms = Some(now_ms);
    }

    pub fn add_to_history(&mut self, role: Role, content: impl Into<String>, now_ms: i64) {
        self.history.push(Turn { role, content: content.into(), ts_ms: now_ms });
    }

    #[must_use]
    pub fn duration_seconds(&self, now_ms: i64) -> f64 {
        let end = self.end_ts_ms.unwrap_or(now_ms);
        (end - self.start_ts_ms).max(0) as f64 / 1000.0
    }

    #[must_use]
    pub fn is_stale(&self, max_ms: i64, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.start_ts_ms) > max_ms
    }

    /// A short machine-readable summary, as used by post-call logging.
    #[must_use]
    pub fn summary(&self, now_ms: i64) -> SessionSummary {
        SessionSummary {
            linked_id: self.linked_id.clone(),
            turns: self.turn,
            successful_turns: self.successful_turns,
            total_silences: self.total_silences,
            duration_seconds: self.duration_seconds(now_ms),
            terminated: self.terminated,
        }
    }

    /// Records a spoken utterance for the current phase and reports whether
    /// it would be a repeat (anti-replay; actual suppression lives in the
    /// policy module, this just updates the tracking state).
    pub fn note_spoken(&mut self, text: impl Into<String>) {
        self.last_spoken = Some(LastSpoken { phase: self.current_phase.clone(), text: text.into() });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub linked_id: String,
    pub turns: u32,
    pub successful_turns: u32,
    pub total_silences: u32,
    pub duration_seconds: f64,
    pub terminated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("call-1", "+1555", "+1777", "clinic-bot", "GREETING", 0)
    }

    #[test]
    fn terminate_is_idempotent() {
        let mut s = session();
        s.terminate(100);
        let end_after_first = s.end_ts_ms;
        s.terminate(200);
        assert_eq!(s.end_ts_ms, end_after_first);
        assert!(s.terminated);
        assert!(!s.active);
    }

    #[test]
    fn terminated_implies_not_active() {
        let mut s = session();
        s.terminate(1);
        assert!(s.terminated && !s.active);
    }

    #[test]
    fn voice_detected_resets_silence_and_advances_turn() {
        let mut s = session();
        s.increment_silence();
        s.increment_silence();
        s.mark_voice_detected();
        assert_eq!(s.consecutive_silences, 0);
        assert_eq!(s.total_silences, 2);
        assert_eq!(s.turn, 1);
        assert_eq!(s.successful_turns, 1);
    }

    #[test]
    fn is_stale_past_deadline() {
        let s = session();
        assert!(s.is_stale(1_000, 2_000));
        assert!(!s.is_stale(5_000, 2_000));
    }
}

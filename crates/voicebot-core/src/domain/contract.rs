//! The engine-domain contract (§3 "Domain Contract Message", §4.7, §9).
//!
//! A domain is anything implementing [`crate::ports::domain::DomainPort`].
//! `DomainAction` is the tagged union the design notes (§9) ask for in place
//! of a dynamically dispatched `domain(ctx)` closure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque business state round-tripped through the engine unchanged (§3).
///
/// The engine never interprets these values; it merges `SetState` updates
/// into this map and hands the whole map back on the next `domain()` call.
pub type BusinessState = BTreeMap<String, serde_json::Value>;

/// What the engine passes to a domain on every call (§4.7 `ctx`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainContext {
    pub transcript: String,
    pub session_id: String,
    pub caller: String,
    pub callee: String,
    pub bot_name: String,
    pub state: BusinessState,
}

/// Tagged union of domain-requested side effects (§3, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainAction {
    SetState { updates: BusinessState },
    EndCall { reason: String, text: Option<String> },
    CallWebhook { name: String, on_success: Option<String>, on_error: Option<String> },
    UseEngine { variant: String },
}

/// Structured interrupt policy a domain may attach to its response, as an
/// alternative to the simpler `allow_barge_in` boolean (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InterruptPolicy {
    pub allow_barge_in: bool,
    pub min_speech_ms: u64,
    pub min_confidence: Option<f32>,
}

impl Default for InterruptPolicy {
    fn default() -> Self {
        Self { allow_barge_in: true, min_speech_ms: 400, min_confidence: Some(0.6) }
    }
}

/// Everything a domain may return from one `process()` call (§3 "Domain
/// Contract Message").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainResult {
    pub tts_text: Option<String>,
    pub audio_file: Option<String>,
    pub next_phase: Option<String>,
    pub should_hangup: bool,
    pub silent: bool,
    pub skip_user_input: bool,
    pub interrupt_policy: Option<InterruptPolicy>,
    pub action: Option<DomainAction>,
    pub state: Option<BusinessState>,
}

impl DomainResult {
    #[must_use]
    pub fn say(text: impl Into<String>) -> Self {
        Self { tts_text: Some(text.into()), ..Self::default() }
    }

    #[must_use]
    pub fn with_next_phase(mut self, phase: impl Into<String>) -> Self {
        self.next_phase = Some(phase.into());
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: DomainAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Guardrail (§4.7): `should_hangup` must agree with an `EndCall` action
    /// when one is present.
    #[must_use]
    pub fn shouldhangup_consistent(&self) -> bool {
        match &self.action {
            Some(DomainAction::EndCall { .. }) => self.should_hangup,
            _ => true,
        }
    }
}

//! A minimal reference domain (§1, §4.7: "Domain packages... are out of
//! scope").
//!
//! Real bots are built as separate domain-package crates registered into the
//! [`voicebot_core::ports::DomainRegistry`] this composition root owns; none
//! ship in this repo. This module wires up just enough of a phase table,
//! lifecycle table, and [`DomainPort`] to let the binary run end to end
//! against a live switch and speech provider for smoke-testing the engine
//! itself, the way `gglib-cli`'s `Commands::CheckDeps` exists to exercise
//! infrastructure without any real model loaded.

use async_trait::async_trait;
use voicebot_core::domain::{Action, DomainContext, DomainResult, LifecycleContractEntry, LifecycleTable, Phase, PhaseKind, PhaseTable};
use voicebot_core::ports::{DomainError, DomainPort};

pub const BOT_NAME: &str = "reference-bot";
pub const DOMAIN_NAME: &str = "reference";

pub const GREETING: &str = "GREETING";
pub const CAPTURE: &str = "CAPTURE";
pub const CONFIRM: &str = "CONFIRM";
pub const COMPLETE: &str = "COMPLETE";

#[must_use]
pub fn phase_table() -> PhaseTable {
    let mut table = PhaseTable::new();
    table.register(Phase::new(GREETING, PhaseKind::Speak));
    table.register(Phase::new(CAPTURE, PhaseKind::Listen));
    table.register(Phase::new(CONFIRM, PhaseKind::Listen));
    table.register(Phase::new(COMPLETE, PhaseKind::Speak));
    table.allow_regression(CONFIRM, CAPTURE);
    table
}

#[must_use]
pub fn lifecycle_table() -> LifecycleTable {
    let mut table = LifecycleTable::new();
    table.register(GREETING, LifecycleContractEntry::allowing([Action::Play]));
    table.register(CAPTURE, LifecycleContractEntry::allowing([Action::Play, Action::Record, Action::StartStt, Action::StartMoh]).advancing_turn());
    table.register(CONFIRM, LifecycleContractEntry::allowing([Action::Play, Action::Record, Action::StartStt, Action::StartMoh]).advancing_turn());
    table.register(COMPLETE, LifecycleContractEntry::allowing([Action::Play]).with_teardown(true));
    table
}

/// Repeats the caller's transcript back as confirmation, then ends the call
/// on the second turn. Exists only to exercise the engine's turn loop; no
/// production bot should resemble it.
pub struct EchoDemoDomain;

#[async_trait]
impl DomainPort for EchoDemoDomain {
    async fn process(&self, ctx: DomainContext) -> Result<DomainResult, DomainError> {
        if ctx.transcript.trim().is_empty() {
            return Ok(DomainResult::say("Hola, ¿en qué puedo ayudarte?").with_next_phase(CAPTURE));
        }
        if ctx.state.contains_key("confirmed") {
            return Ok(DomainResult {
                tts_text: Some("Gracias, hasta luego.".to_string()),
                next_phase: Some(COMPLETE.to_string()),
                should_hangup: true,
                ..DomainResult::default()
            });
        }
        let mut state = ctx.state;
        state.insert("confirmed".to_string(), serde_json::Value::Bool(true));
        Ok(DomainResult {
            tts_text: Some(format!("Entendido: {}. ¿Es correcto?", ctx.transcript)),
            next_phase: Some(CONFIRM.to_string()),
            state: Some(state),
            ..DomainResult::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicebot_core::domain::contract::BusinessState;

    fn ctx(transcript: &str, state: BusinessState) -> DomainContext {
        DomainContext {
            transcript: transcript.to_string(),
            session_id: "call-1".to_string(),
            caller: "+1555".to_string(),
            callee: "+1777".to_string(),
            bot_name: BOT_NAME.to_string(),
            state,
        }
    }

    #[tokio::test]
    async fn empty_transcript_greets_and_moves_to_capture() {
        let result = EchoDemoDomain.process(ctx("", BusinessState::new())).await.unwrap();
        assert_eq!(result.next_phase.as_deref(), Some(CAPTURE));
        assert!(!result.should_hangup);
    }

    #[tokio::test]
    async fn first_utterance_asks_for_confirmation() {
        let result = EchoDemoDomain.process(ctx("agendar una hora", BusinessState::new())).await.unwrap();
        assert_eq!(result.next_phase.as_deref(), Some(CONFIRM));
        assert!(result.state.is_some_and(|s| s.contains_key("confirmed")));
    }

    #[tokio::test]
    async fn confirmed_state_ends_the_call() {
        let mut state = BusinessState::new();
        state.insert("confirmed".to_string(), serde_json::Value::Bool(true));
        let result = EchoDemoDomain.process(ctx("sí", state)).await.unwrap();
        assert!(result.should_hangup);
        assert_eq!(result.next_phase.as_deref(), Some(COMPLETE));
    }

    #[test]
    fn phase_table_registers_all_four_phases() {
        let table = phase_table();
        assert!(table.contains(GREETING));
        assert!(table.contains(CAPTURE));
        assert!(table.contains(CONFIRM));
        assert!(table.contains(COMPLETE));
    }

    #[test]
    fn lifecycle_table_denies_stt_outside_listen_phases() {
        let table = lifecycle_table();
        assert!(!table.is_action_allowed(GREETING, Action::StartStt, false));
        assert!(table.is_action_allowed(CAPTURE, Action::StartStt, false));
    }
}

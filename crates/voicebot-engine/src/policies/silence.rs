//! Silence Policy (C6, §4.6).

/// What the orchestrator should do in response to a silent turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SilenceAction {
    /// First silence: play a static re-prompt (never a free LLM turn, §4.5).
    Prompt { message: String },
    /// Subsequent (non-terminal) silence: just loop again.
    Continue,
    /// `consecutive_silences >= max_silent_turns`: fail-closed, end the call.
    Goodbye { message: String },
}

#[derive(Debug, Clone)]
pub struct SilencePolicy {
    pub max_silent_turns: u32,
    pub fail_closed: bool,
    pub prompt_message: String,
    pub goodbye_message: String,
}

impl SilencePolicy {
    #[must_use]
    pub fn new(max_silent_turns: u32) -> Self {
        Self {
            max_silent_turns,
            fail_closed: true,
            prompt_message: "¿Sigue en línea? Por favor, dígame sí o no.".to_string(),
            goodbye_message: "Parece que no hay respuesta. Hasta luego.".to_string(),
        }
    }

    /// §8 property 5: `consecutive_silences >= max_silent_turns ⇒ terminated`
    /// within one iteration — callers must act on `Goodbye` by terminating.
    #[must_use]
    pub fn evaluate(&self, consecutive_silences: u32) -> SilenceAction {
        if consecutive_silences >= self.max_silent_turns {
            return SilenceAction::Goodbye { message: self.goodbye_message.clone() };
        }
        if consecutive_silences == 1 {
            return SilenceAction::Prompt { message: self.prompt_message.clone() };
        }
        SilenceAction::Continue
    }
}

impl Default for SilencePolicy {
    fn default() -> Self {
        Self::new(voicebot_core::settings::DEFAULT_MAX_SILENT_TURNS)
    }
}

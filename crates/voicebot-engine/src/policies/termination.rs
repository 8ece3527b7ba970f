//! Termination Policy (C6, §4.6, §4.5 step 9).

use std::time::Duration;
use tokio::time::sleep;
use tracing::info;
use voicebot_core::domain::Session;
use voicebot_core::ports::{Media, PlaybackTarget, TelephonyError, TelephonyPort};

const GOODBYE_PHRASES: &[&str] = &["hasta luego", "que tenga un buen día", "adiós", "gracias por llamar"];

/// Fixed delay to let audio tail play out before hanging up (§4.5 step 9).
const AUDIO_TAIL_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
pub struct TerminationPolicy;

impl TerminationPolicy {
    /// Whether `text` (an assistant utterance) contains a goodbye phrase.
    #[must_use]
    pub fn contains_goodbye(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        GOODBYE_PHRASES.iter().any(|phrase| lowered.contains(phrase))
    }

    /// Plays the final utterance (if any — a channel that's already gone
    /// tolerates this, §4.5 "every playback call is preceded by an
    /// alive-check ... missing channel ⇒ skip playback, do not abort
    /// session"), waits out the audio tail, then hangs up and marks the
    /// session terminated. `media` is `None` when the caller already spoke
    /// the final line itself and only needs the tail-wait-and-hangup half.
    pub async fn finalize(&self, telephony: &dyn TelephonyPort, session: &mut Session, channel_id: &str, media: Option<Media>, now_ms: i64) {
        if let Some(media) = media {
            match telephony.is_alive(channel_id).await {
                Ok(true) => {
                    if let Ok(playback) = telephony.play(PlaybackTarget::Channel(channel_id.to_string()), media).await {
                        let _ = playback.wait().await;
                    }
                }
                Ok(false) => info!(call = %session.linked_id, "channel gone before final playback, skipping"),
                Err(err) => info!(call = %session.linked_id, error = %err, "alive-check failed before final playback, skipping"),
            }
        }

        sleep(AUDIO_TAIL_DELAY).await;

        if let Err(err) = telephony.hangup(channel_id).await {
            if !matches!(err, TelephonyError::NotFound(_)) {
                info!(call = %session.linked_id, error = %err, "hangup failed during finalize");
            }
        }

        session.terminate(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_goodbye_phrase() {
        let policy = TerminationPolicy::default();
        assert!(policy.contains_goodbye("Muy bien, hasta luego."));
    }

    #[test]
    fn is_case_insensitive() {
        let policy = TerminationPolicy::default();
        assert!(policy.contains_goodbye("HASTA LUEGO"));
    }

    #[test]
    fn non_goodbye_text_does_not_match() {
        let policy = TerminationPolicy::default();
        assert!(!policy.contains_goodbye("¿En qué puedo ayudarle?"));
    }
}

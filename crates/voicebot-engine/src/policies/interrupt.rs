//! Barge-In Gate (C6, §4.5 step 7, §4.6): decides whether a
//! `ChannelTalkingStarted` event during assistant speech is real speech
//! worth interrupting for, or noise to ignore.

use std::time::Duration;
use voicebot_core::domain::InterruptPolicy;

#[derive(Debug, Clone)]
pub struct BargeInGate {
    pub policy: InterruptPolicy,
    pub debounce: Duration,
}

impl BargeInGate {
    #[must_use]
    pub fn new(policy: InterruptPolicy, debounce: Duration) -> Self {
        Self { policy, debounce }
    }

    /// `speech_duration` is how long talking has been continuously detected
    /// so far; `confidence` is the provider's voice-activity confidence, if
    /// it reports one. Open Question: a provider that never reports
    /// confidence must not be penalized for it, so `None` always passes the
    /// confidence gate.
    #[must_use]
    pub fn should_interrupt(&self, speech_duration: Duration, confidence: Option<f32>) -> bool {
        if !self.policy.allow_barge_in {
            return false;
        }
        if speech_duration < self.debounce {
            return false;
        }
        if speech_duration.as_millis() < u128::from(self.policy.min_speech_ms) {
            return false;
        }
        match (self.policy.min_confidence, confidence) {
            (Some(min), Some(observed)) => observed >= min,
            (Some(_), None) => true,
            (None, _) => true,
        }
    }
}

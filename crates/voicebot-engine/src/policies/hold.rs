//! Hold / MoH Policy (C6, §4.6).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HoldPolicy {
    pub enabled: bool,
    pub enter_on_first_silence: bool,
    pub max_hold_duration: Duration,
    pub music_class: String,
}

impl HoldPolicy {
    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false, enter_on_first_silence: true, max_hold_duration: Duration::from_secs(30), music_class: String::new() }
    }

    #[must_use]
    pub fn enabled(music_class: impl Into<String>) -> Self {
        Self { enabled: true, enter_on_first_silence: true, max_hold_duration: Duration::from_secs(30), music_class: music_class.into() }
    }

    /// Overrides the default 30s timeout with a configured duration
    /// (`settings.effective_hold_duration_ms()`).
    #[must_use]
    pub fn with_max_duration_ms(mut self, ms: u64) -> Self {
        self.max_hold_duration = Duration::from_millis(ms);
        self
    }

    /// Whether hold should be entered for a silent phase given the current
    /// consecutive-silence count and whether we're already in hold (§4.5
    /// step 3).
    #[must_use]
    pub fn should_enter(&self, consecutive_silences: u32, already_in_hold: bool) -> bool {
        if !self.enabled || already_in_hold {
            return false;
        }
        if self.enter_on_first_silence {
            consecutive_silences >= 1
        } else {
            consecutive_silences >= 2
        }
    }

    /// Whether hold should be exited: on voice detected, or once
    /// `elapsed >= max_hold_duration`.
    #[must_use]
    pub fn should_exit(&self, voice_detected: bool, elapsed: Duration) -> bool {
        voice_detected || elapsed >= self.max_hold_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_policy_never_enters_hold() {
        let policy = HoldPolicy::disabled();
        assert!(!policy.should_enter(5, false));
    }

    #[test]
    fn enters_on_first_silence_when_enabled() {
        let policy = HoldPolicy::enabled("default");
        assert!(policy.should_enter(1, false));
    }

    #[test]
    fn does_not_re_enter_when_already_on_hold() {
        let policy = HoldPolicy::enabled("default");
        assert!(!policy.should_enter(1, true));
    }

    #[test]
    fn exits_on_voice() {
        let policy = HoldPolicy::enabled("default");
        assert!(policy.should_exit(true, Duration::from_secs(1)));
    }

    #[test]
    fn exits_on_timeout() {
        let policy = HoldPolicy::enabled("default");
        assert!(policy.should_exit(false, Duration::from_secs(31)));
    }

    #[test]
    fn with_max_duration_ms_overrides_the_default_timeout() {
        let policy = HoldPolicy::enabled("default").with_max_duration_ms(5_000);
        assert!(!policy.should_exit(false, Duration::from_millis(4_999)));
        assert!(policy.should_exit(false, Duration::from_millis(5_000)));
    }
}

//! Engine settings (§6 "Process CLI / env").
//!
//! Pure domain type with no infrastructure dependencies, mirroring the
//! teacher's `gglib_core::settings::Settings`: `Option<T>` fields with
//! graceful defaults, loaded by the composition root (`voicebot-cli`),
//! never read from package-level globals.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TURNS: u32 = 20;
pub const DEFAULT_MAX_SILENCE_SECONDS: f64 = 2.5;
pub const DEFAULT_MAX_RECORDING_MS: u64 = 9_000;
pub const DEFAULT_MIN_RECORDING_BYTES: u64 = 4_000;
pub const DEFAULT_MAX_SILENT_TURNS: u32 = 3;
pub const DEFAULT_TALKING_DEBOUNCE_MS: u64 = 250;
pub const DEFAULT_PLAYBACK_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MATERIALIZATION_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_HOLD_DURATION_MS: u64 = 30_000;

/// Which direction a call was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CallMode {
    #[default]
    Inbound,
    Outbound,
}

/// Runtime settings for one process (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub call_mode: CallMode,
    pub shared_store_addr: Option<String>,
    pub recording_spool_path: Option<String>,
    pub voicebot_audio_path: Option<String>,

    pub max_turns: Option<u32>,
    pub max_silence_seconds: Option<f64>,
    pub max_recording_ms: Option<u64>,
    pub min_recording_bytes: Option<u64>,
    pub max_silent_turns: Option<u32>,
    pub talking_debounce_ms: Option<u64>,
    pub playback_timeout_ms: Option<u64>,
    pub materialization_timeout_ms: Option<u64>,
    pub hold_duration_ms: Option<u64>,
    pub music_class: Option<String>,
    pub transfer_queue: Option<String>,

    pub enable_continuous_recording_segments: bool,

    /// Legacy `SILENT_PHASES` fallback (SPEC_FULL §D.1): consulted only
    /// when a phase's table entry doesn't already declare `kind = Silent`.
    pub legacy_silent_phases: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Settings {
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            call_mode: CallMode::Inbound,
            shared_store_addr: None,
            recording_spool_path: None,
            voicebot_audio_path: None,
            max_turns: Some(DEFAULT_MAX_TURNS),
            max_silence_seconds: Some(DEFAULT_MAX_SILENCE_SECONDS),
            max_recording_ms: Some(DEFAULT_MAX_RECORDING_MS),
            min_recording_bytes: Some(DEFAULT_MIN_RECORDING_BYTES),
            max_silent_turns: Some(DEFAULT_MAX_SILENT_TURNS),
            talking_debounce_ms: Some(DEFAULT_TALKING_DEBOUNCE_MS),
            playback_timeout_ms: Some(DEFAULT_PLAYBACK_TIMEOUT_MS),
            materialization_timeout_ms: Some(DEFAULT_MATERIALIZATION_TIMEOUT_MS),
            hold_duration_ms: Some(DEFAULT_HOLD_DURATION_MS),
            music_class: None,
            transfer_queue: None,
            enable_continuous_recording_segments: false,
            legacy_silent_phases: Vec::new(),
        }
    }

    #[must_use]
    pub fn effective_max_turns(&self) -> u32 {
        self.max_turns.unwrap_or(DEFAULT_MAX_TURNS)
    }

    #[must_use]
    pub fn effective_max_silence_seconds(&self) -> f64 {
        self.max_silence_seconds.unwrap_or(DEFAULT_MAX_SILENCE_SECONDS)
    }

    #[must_use]
    pub fn effective_max_recording_ms(&self) -> u64 {
        self.max_recording_ms.unwrap_or(DEFAULT_MAX_RECORDING_MS)
    }

    #[must_use]
    pub fn effective_min_recording_bytes(&self) -> u64 {
        self.min_recording_bytes.unwrap_or(DEFAULT_MIN_RECORDING_BYTES)
    }

    #[must_use]
    pub fn effective_max_silent_turns(&self) -> u32 {
        self.max_silent_turns.unwrap_or(DEFAULT_MAX_SILENT_TURNS)
    }

    #[must_use]
    pub fn effective_talking_debounce_ms(&self) -> u64 {
        self.talking_debounce_ms.unwrap_or(DEFAULT_TALKING_DEBOUNCE_MS)
    }

    #[must_use]
    pub fn effective_playback_timeout_ms(&self) -> u64 {
        self.playback_timeout_ms.unwrap_or(DEFAULT_PLAYBACK_TIMEOUT_MS)
    }

    #[must_use]
    pub fn effective_materialization_timeout_ms(&self) -> u64 {
        self.materialization_timeout_ms.unwrap_or(DEFAULT_MATERIALIZATION_TIMEOUT_MS)
    }

    #[must_use]
    pub fn effective_hold_duration_ms(&self) -> u64 {
        self.hold_duration_ms.unwrap_or(DEFAULT_HOLD_DURATION_MS)
    }
}

/// Validation errors for settings loaded at process start (§6, §7
/// `FatalInit`).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("shared_store_addr is required")]
    MissingStoreAddr,
    #[error("max_silent_turns must be >= 1 for fail-closed silence handling")]
    InvalidMaxSilentTurns,
}

pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if settings.shared_store_addr.as_deref().unwrap_or_default().is_empty() {
        return Err(SettingsError::MissingStoreAddr);
    }
    if settings.effective_max_silent_turns() == 0 {
        return Err(SettingsError::InvalidMaxSilentTurns);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let s = Settings::with_defaults();
        assert_eq!(s.effective_max_turns(), 20);
        assert!((s.effective_max_silence_seconds() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_missing_store_addr() {
        let s = Settings::with_defaults();
        assert_eq!(validate_settings(&s), Err(SettingsError::MissingStoreAddr));
    }

    #[test]
    fn validate_rejects_zero_max_silent_turns() {
        let mut s = Settings::with_defaults();
        s.shared_store_addr = Some("redis://localhost".into());
        s.max_silent_turns = Some(0);
        assert_eq!(validate_settings(&s), Err(SettingsError::InvalidMaxSilentTurns));
    }

    #[test]
    fn validate_accepts_complete_settings() {
        let mut s = Settings::with_defaults();
        s.shared_store_addr = Some("redis://localhost".into());
        assert!(validate_settings(&s).is_ok());
    }
}

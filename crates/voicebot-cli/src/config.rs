//! Process configuration (§6 "Process CLI / env").
//!
//! Everything infrastructure-shaped (URLs, paths, queue names) is parsed
//! here from CLI flags and environment variables, the same split
//! `gglib_cli::CliConfig` makes between "where things live" and the
//! `Settings` domain type that governs turn behavior.

use clap::Parser;
use voicebot_core::settings::{CallMode, Settings};

#[derive(Debug, Parser)]
#[command(name = "voicebot", about = "Real-time telephony voice-bot session engine")]
pub struct CliArgs {
    /// Base URL of the switch's REST control interface, e.g. `http://127.0.0.1:8088/ari`.
    #[arg(long, env = "TELEPHONY_REST_URL")]
    pub telephony_rest_url: String,

    /// WebSocket URL of the switch's event stream.
    #[arg(long, env = "TELEPHONY_WS_URL")]
    pub telephony_ws_url: String,

    /// Stasis application name both telephony surfaces are scoped to.
    #[arg(long, env = "TELEPHONY_APP", default_value = "voicebot")]
    pub telephony_app: String,

    /// WebSocket URL of the realtime speech provider.
    #[arg(long, env = "SPEECH_WS_URL")]
    pub speech_ws_url: String,

    /// Shared KV store connection string (§6).
    #[arg(long, env = "SHARED_STORE_ADDR")]
    pub shared_store_addr: String,

    /// Directory the post-call finalizer writes final recordings/transcripts into.
    #[arg(long, env = "VOICEBOT_AUDIO_PATH", default_value = "/var/spool/voicebot/audio")]
    pub voicebot_audio_path: String,

    /// Path to the `ffmpeg` binary used for segment extraction (§4.9).
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: String,

    /// Call-queue extension the transfer-detector policy hands off to (§4.6).
    #[arg(long, env = "TRANSFER_QUEUE", default_value = "support")]
    pub transfer_queue: String,

    /// MoH class used while on hold (§4.6). Hold is disabled if unset.
    #[arg(long, env = "HOLD_MUSIC_CLASS")]
    pub hold_music_class: Option<String>,

    #[arg(long, env = "MAX_TURNS")]
    pub max_turns: Option<u32>,

    #[arg(long, env = "MAX_SILENT_TURNS")]
    pub max_silent_turns: Option<u32>,
}

impl CliArgs {
    /// Builds the domain-facing [`Settings`] from the parsed process config.
    #[must_use]
    pub fn to_settings(&self) -> Settings {
        let mut settings = Settings::with_defaults();
        settings.call_mode = CallMode::Inbound;
        settings.shared_store_addr = Some(self.shared_store_addr.clone());
        settings.voicebot_audio_path = Some(self.voicebot_audio_path.clone());
        settings.music_class = self.hold_music_class.clone();
        settings.transfer_queue = Some(self.transfer_queue.clone());
        if self.max_turns.is_some() {
            settings.max_turns = self.max_turns;
        }
        if self.max_silent_turns.is_some() {
            settings.max_silent_turns = self.max_silent_turns;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_settings_carries_the_store_address_through() {
        let args = CliArgs {
            telephony_rest_url: "http://127.0.0.1:8088/ari".into(),
            telephony_ws_url: "ws://127.0.0.1:8088/ari/events".into(),
            telephony_app: "voicebot".into(),
            speech_ws_url: "wss://speech.example/v1/realtime".into(),
            shared_store_addr: "redis://127.0.0.1:6379".into(),
            voicebot_audio_path: "/tmp/audio".into(),
            ffmpeg_path: "ffmpeg".into(),
            transfer_queue: "support".into(),
            hold_music_class: None,
            max_turns: None,
            max_silent_turns: Some(5),
        };
        let settings = args.to_settings();
        assert_eq!(settings.shared_store_addr.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(settings.effective_max_silent_turns(), 5);
    }
}

//! Speech Adapter port (C2, §4.2, §6).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("transport dropped: {0}")]
    Transport(String),
    #[error("response was cancelled")]
    Cancelled,
    #[error("provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    MuLaw8k,
    Pcm16_24k,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSessionConfig {
    pub voice: String,
    pub language: String,
    pub model: String,
    pub instructions: String,
    pub transcription_model: String,
    pub input_format: AudioFormat,
    pub output_format: AudioFormat,
}

/// A single base64-encoded audio frame pushed to the provider.
#[derive(Debug, Clone)]
pub struct AudioFrame(pub Vec<u8>);

/// PCM16 audio buffer returned by synthesis/response calls.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer(pub Vec<u8>);

/// Long-lived streaming session to the speech provider (C2, §4.2).
///
/// Ordering guarantee (§4.2): for any single response, `Started` precedes
/// `delta*`, which precede `Completed`. At most one response is in flight
/// per session (§5); `cancel_current_response` must be callable between
/// arbitrary deltas and makes that count 0 within one suspension point
/// (§8 property 1).
#[async_trait]
pub trait SpeechPort: Send + Sync {
    async fn connect(&self, config: SpeechSessionConfig) -> Result<(), SpeechError>;

    /// Pushes user audio, commits, requests a response, and returns the
    /// final synthesized PCM (audio-in, audio-out turn).
    async fn send_audio_and_wait(&self, frames: Vec<AudioFrame>) -> Result<AudioBuffer, SpeechError>;

    /// Transcript only — no audio response is requested.
    async fn transcribe_audio_only(&self, frames: Vec<AudioFrame>) -> Result<String, SpeechError>;

    /// TTS only — no LLM turn, just synthesis of the given text.
    async fn synthesize_speech(&self, text: &str) -> Result<AudioBuffer, SpeechError>;

    /// Injects a system message then requests a response.
    async fn send_system_text(&self, text: &str) -> Result<AudioBuffer, SpeechError>;

    /// Cancels any in-flight response and clears the input buffer
    /// (barge-in, §4.5 step 8). Safe to call with nothing in flight.
    async fn cancel_current_response(&self, reason: &str) -> Result<(), SpeechError>;

    /// Switches transcription model and enables partial `delta` events.
    async fn set_incremental(&self, on: bool) -> Result<(), SpeechError>;

    /// True while a response is in flight for this session (§8 property 1).
    async fn has_in_flight_response(&self) -> bool;
}

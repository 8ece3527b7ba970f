//! Telephony Adapter port (C1, §4.1, §6).
//!
//! Design rule (same as the teacher's port traits): no transport types
//! (no HTTP client, no WS frame types) leak into this signature — only
//! domain-shaped DTOs and the [`TelephonyPort`] trait itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use std::time::Duration;

/// Errors any telephony-control call may fail with (§4.1, §7).
#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflicting state: {0}")]
    ConflictState(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// A bridge creation type (mixing bridge is the only kind the engine uses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeType {
    Mixing,
}

/// Playback target: a single channel or a bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlaybackTarget {
    Channel(String),
    Bridge(String),
}

/// A media reference: either a pre-recorded asset name or raw TTS audio
/// already staged on the switch side (the adapter doesn't care which).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub uri: String,
}

impl Media {
    #[must_use]
    pub fn sound(name: impl Into<String>) -> Self {
        Self { uri: format!("sound:{}", name.into()) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOptions {
    pub format: String,
    pub max_duration_ms: u64,
    pub max_silence_ms: u64,
    pub beep: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnoopSpec {
    pub spy: String,
    pub whisper: String,
    pub app: String,
}

/// Lifecycle event a [`Playback`] handle can report (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started,
    Finished,
    Stopped,
    Failed,
}

/// Handle returned by [`TelephonyPort::play`]. Implementations must
/// synthesize `Started` if the switch's start call succeeded with an id but
/// never emitted the event (§4.1).
#[async_trait]
pub trait Playback: Send + Sync {
    async fn stop(&self) -> Result<(), TelephonyError>;
    /// Blocks until a terminal event (`Finished`, `Stopped`, `Failed`) or the
    /// playback timeout (default 30s, §5) elapses, in which case the
    /// implementation forces a stop and returns `Failed`.
    async fn wait(&self) -> PlaybackEvent;
}

/// Telephony events subscribed to via [`TelephonyPort::subscribe`] (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelephonyEvent {
    StasisStart { channel_id: String, linked_id: String },
    StasisEnd { channel_id: String, linked_id: String },
    ChannelTalkingStarted { channel_id: String },
    ChannelTalkingFinished { channel_id: String },
    PlaybackStarted { playback_id: String },
    PlaybackFinished { playback_id: String },
    PlaybackStopped { playback_id: String },
    PlaybackFailed { playback_id: String },
    RecordingFinished { name: String },
    RecordingFailed { name: String },
}

/// The set of event kinds a caller wants delivered through
/// [`TelephonyPort::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    StasisStart,
    StasisEnd,
    ChannelTalkingStarted,
    ChannelTalkingFinished,
    Playback,
    Recording,
}

/// Thin facade over the telephony switch's control interface (C1, §4.1).
#[async_trait]
pub trait TelephonyPort: Send + Sync {
    async fn is_alive(&self, channel_id: &str) -> Result<bool, TelephonyError>;
    async fn hangup(&self, channel_id: &str) -> Result<(), TelephonyError>;
    async fn continue_in_dialplan(&self, channel_id: &str, context: &str, extension: &str, priority: u32) -> Result<(), TelephonyError>;
    async fn play(&self, target: PlaybackTarget, media: Media) -> Result<Box<dyn Playback>, TelephonyError>;
    async fn record(&self, channel_id: &str, opts: RecordOptions) -> Result<Recording, TelephonyError>;
    async fn create_bridge(&self, bridge_type: BridgeType) -> Result<String, TelephonyError>;
    async fn add_channel_to_bridge(&self, bridge_id: &str, channel_id: &str) -> Result<(), TelephonyError>;
    async fn create_snoop(&self, parent_channel_id: &str, spec: SnoopSpec) -> Result<String, TelephonyError>;
    async fn start_moh(&self, channel_id: &str, music_class: &str) -> Result<(), TelephonyError>;
    async fn stop_moh(&self, channel_id: &str) -> Result<(), TelephonyError>;

    /// Subscribes to a set of event kinds; returned events interleave across
    /// all calls currently tracked by the adapter, filtered by the caller
    /// downstream on `linked_id`/`channel_id`.
    async fn subscribe(&self, kinds: &[EventKind]) -> Result<tokio::sync::mpsc::Receiver<TelephonyEvent>, TelephonyError>;

    /// Materialization probe (§4.1): polls every 50ms until `channel_id`
    /// reports `Up` or `timeout` elapses.
    async fn wait_for_audio_plane_ready(&self, channel_id: &str, timeout: Duration) -> bool;

    /// Pin-retry protocol (§4.1): retries with 100ms back-off on
    /// `NotFound`/`400` up to `max_retries` times.
    async fn pin_snoop_to_bridge(&self, bridge_id: &str, channel_id: &str, max_retries: u32) -> Result<(), TelephonyError>;
}

//! Recording Segmenter port (C9, §4.9).

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("transcoder failed: {0}")]
    Transcoder(String),
    #[error("segment too small ({bytes} bytes, need at least {min_bytes})")]
    TooSmall { bytes: u64, min_bytes: u64 },
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Clone)]
pub struct RecordingHandle {
    pub recording_name: String,
    pub path: String,
}

/// Continuous-capture + segment-on-demand port (§4.9).
///
/// `start` begins capture of the user-only tap *before* it is attached to
/// any bridge, since the switch forbids recording an already-bridged
/// channel (§4.9).
#[async_trait]
pub trait RecordingSegmenterPort: Send + Sync {
    async fn start(&self, call_id: &str, snoop_channel_id: &str) -> Result<RecordingHandle, RecordingError>;
    async fn stop(&self, recording: &RecordingHandle) -> Result<(), RecordingError>;

    /// Cuts `[start_ms, end_ms)` out of `input_path` into `output_path` at
    /// `sample_rate`, validating the output is at least 1KB (§4.9).
    async fn extract_wav_segment_ms(&self, input_path: &str, start_ms: u64, end_ms: u64, output_path: &str, sample_rate: u32) -> Result<(), RecordingError>;
}

//! [`RecordingSegmenterPort`] implementation (C9, §4.9): recording
//! start/stop rides the same REST client as the rest of the telephony
//! surface; segment extraction shells out to the system audio transcoder
//! the same way `gglib-runtime` shells out to `llama-server`.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;

use voicebot_core::ports::{RecordOptions, RecordingError, RecordingHandle, RecordingSegmenterPort};

use crate::error::TransportError;
use crate::rest::RestClient;

const MIN_SEGMENT_BYTES: u64 = 1024;

pub struct FfmpegRecordingSegmenter {
    rest: Arc<RestClient>,
    ffmpeg_path: String,
}

impl FfmpegRecordingSegmenter {
    #[must_use]
    pub fn new(rest: Arc<RestClient>, ffmpeg_path: impl Into<String>) -> Self {
        Self { rest, ffmpeg_path: ffmpeg_path.into() }
    }
}

#[async_trait]
impl RecordingSegmenterPort for FfmpegRecordingSegmenter {
    async fn start(&self, call_id: &str, snoop_channel_id: &str) -> Result<RecordingHandle, RecordingError> {
        let opts = RecordOptions {
            format: "wav".to_string(),
            max_duration_ms: 4 * 60 * 60 * 1000,
            max_silence_ms: 0,
            beep: false,
        };
        let recording = self
            .rest
            .start_recording(snoop_channel_id, &opts)
            .await
            .map_err(|err| map_transport(err, call_id))?;
        Ok(RecordingHandle { recording_name: recording.name, path: recording.path })
    }

    async fn stop(&self, recording: &RecordingHandle) -> Result<(), RecordingError> {
        self.rest.stop_recording(&recording.recording_name).await.map_err(|err| map_transport(err, &recording.recording_name))
    }

    async fn extract_wav_segment_ms(
        &self,
        input_path: &str,
        start_ms: u64,
        end_ms: u64,
        output_path: &str,
        sample_rate: u32,
    ) -> Result<(), RecordingError> {
        let duration_ms = end_ms.saturating_sub(start_ms);
        let status = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-ss")
            .arg(format_seconds(start_ms))
            .arg("-t")
            .arg(format_seconds(duration_ms))
            .arg("-i")
            .arg(input_path)
            .arg("-ar")
            .arg(sample_rate.to_string())
            .arg(output_path)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| RecordingError::Io(e.to_string()))?;

        if !status.success() {
            return Err(RecordingError::Transcoder(format!("ffmpeg exited with {status}")));
        }

        let metadata = tokio::fs::metadata(output_path).await.map_err(|e| RecordingError::Io(e.to_string()))?;
        if metadata.len() < MIN_SEGMENT_BYTES {
            return Err(RecordingError::TooSmall { bytes: metadata.len(), min_bytes: MIN_SEGMENT_BYTES });
        }
        Ok(())
    }
}

fn format_seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

fn map_transport(err: TransportError, context: &str) -> RecordingError {
    match err {
        TransportError::NotFound(_) => RecordingError::Io(format!("recording channel gone: {context}")),
        other => RecordingError::Transcoder(other.to_string()),
    }
}

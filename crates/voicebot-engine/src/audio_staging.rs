//! Audio Staging (§4.2, §4.5 step 7): the switch only knows how to play a
//! named asset, never raw PCM, so synthesized speech has to be written to
//! disk before it can be handed to [`voicebot_core::ports::TelephonyPort::play`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use voicebot_core::ports::{AudioBuffer, AudioFormat, Media};

/// Stages [`AudioBuffer`]s as WAV files under a shared root and hands back a
/// `sound:` [`Media`] reference to the staged path.
pub struct AudioStager {
    root: PathBuf,
    format: AudioFormat,
    seq: AtomicU64,
}

impl AudioStager {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, format: AudioFormat) -> Self {
        Self { root: root.into(), format, seq: AtomicU64::new(0) }
    }

    /// Writes `buffer` as a WAV file named after `linked_id` and a
    /// monotonic sequence number, then returns a [`Media`] pointing the
    /// switch at it. The `sound:` URI accepts an absolute filesystem path
    /// with no extension.
    pub async fn stage(&self, linked_id: &str, buffer: &AudioBuffer) -> std::io::Result<Media> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let stem = self.root.join(format!("{linked_id}_{seq}"));
        let file_path = stem.with_extension("wav");
        tokio::fs::write(&file_path, wav_bytes(buffer, self.format)).await?;
        Ok(Media::sound(stem.display().to_string()))
    }
}

fn wav_bytes(buffer: &AudioBuffer, format: AudioFormat) -> Vec<u8> {
    let (format_code, channels, sample_rate, bits_per_sample): (u16, u16, u32, u16) = match format {
        AudioFormat::MuLaw8k => (7, 1, 8_000, 8),
        AudioFormat::Pcm16_24k => (1, 1, 24_000, 16),
    };
    let data = &buffer.0;
    let block_align = channels * bits_per_sample / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = data.len() as u32;

    let mut out = Vec::with_capacity(44 + data.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&format_code.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(data);
    out
}

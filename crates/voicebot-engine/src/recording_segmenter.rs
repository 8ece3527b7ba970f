//! Recording Segmenter (C9, §4.9): continuous per-call capture plus an
//! append-only audio-mark log that segments derive from on demand.

use std::sync::Arc;
use std::time::Duration;

use voicebot_core::domain::{resolve_audio_segments, AudioMark, AudioSegment, MarkType};
use voicebot_core::ports::{RecordingError, RecordingHandle, RecordingSegmenterPort, SharedStorePort, StoreError};

/// TTL on the `audio:marks:{linkedId}` list key (§6).
const MARK_LOG_TTL: Duration = Duration::from_secs(3600);

fn marks_key(linked_id: &str) -> String {
    format!("audio:marks:{linked_id}")
}

/// Append-only mark log backed by the shared store's list commands (§6).
pub struct AudioMarkLog {
    store: Arc<dyn SharedStorePort>,
}

impl AudioMarkLog {
    #[must_use]
    pub fn new(store: Arc<dyn SharedStorePort>) -> Self {
        Self { store }
    }

    pub async fn append(&self, mark: &AudioMark) -> Result<(), StoreError> {
        let raw = serde_json::to_string(mark).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let key = marks_key(&mark.linked_id);
        self.store.rpush(&key, &raw).await?;
        self.store.expire(&key, MARK_LOG_TTL).await
    }

    pub async fn all(&self, linked_id: &str) -> Result<Vec<AudioMark>, StoreError> {
        let raw = self.store.lrange(&marks_key(linked_id), 0, -1).await?;
        raw.iter()
            .map(|s| serde_json::from_str(s).map_err(|e| StoreError::Serialization(e.to_string())))
            .collect()
    }

    /// Convenience wrapper the orchestrator calls at well-known points in
    /// the turn loop (e.g. `LISTEN_START`, `INTENT_FINALIZED`).
    pub async fn mark(&self, linked_id: &str, offset_ms: u64, mark_type: MarkType, now_ms: i64) -> Result<(), StoreError> {
        self.append(&AudioMark {
            linked_id: linked_id.to_string(),
            offset_ms,
            mark_type,
            reason: None,
            meta: serde_json::Value::Null,
            ts_ms: now_ms,
        })
        .await
    }
}

/// Continuous capture plus on-demand segmentation (§4.9).
pub struct RecordingSegmenter {
    backend: Arc<dyn RecordingSegmenterPort>,
    marks: Arc<AudioMarkLog>,
}

impl RecordingSegmenter {
    #[must_use]
    pub fn new(backend: Arc<dyn RecordingSegmenterPort>, marks: Arc<AudioMarkLog>) -> Self {
        Self { backend, marks }
    }

    /// Begins continuous capture of the user-only tap. Must be called
    /// before the snoop channel is attached to any bridge (§4.9).
    pub async fn start(&self, call_id: &str, snoop_channel_id: &str) -> Result<RecordingHandle, RecordingError> {
        self.backend.start(call_id, snoop_channel_id).await
    }

    pub async fn stop(&self, recording: &RecordingHandle) -> Result<(), RecordingError> {
        self.backend.stop(recording).await
    }

    /// Reads the mark log for `linked_id` and resolves it into segments.
    pub async fn segments_for(&self, linked_id: &str) -> Result<Vec<AudioSegment>, StoreError> {
        let marks = self.marks.all(linked_id).await?;
        Ok(resolve_audio_segments(&marks))
    }

    pub async fn extract_segment(&self, input_path: &str, segment: &AudioSegment, output_path: &str, sample_rate: u32) -> Result<(), RecordingError> {
        let end_ms = segment.end_ms.unwrap_or(segment.start_ms);
        self.backend.extract_wav_segment_ms(input_path, segment.start_ms, end_ms, output_path, sample_rate).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        strings: Mutex<HashMap<String, String>>,
        lists: Mutex<HashMap<String, Vec<String>>>,
    }

    #[async_trait]
    impl SharedStorePort for FakeStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.strings.lock().unwrap().get(key).cloned())
        }
        async fn set_px(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), StoreError> {
            self.strings.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }
        async fn del(&self, key: &str) -> Result<(), StoreError> {
            self.strings.lock().unwrap().remove(key);
            self.lists.lock().unwrap().remove(key);
            Ok(())
        }
        async fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.lists.lock().unwrap().entry(key.to_string()).or_default().push(value.to_string());
            Ok(())
        }
        async fn lrange(&self, key: &str, _start: i64, _stop: i64) -> Result<Vec<String>, StoreError> {
            Ok(self.lists.lock().unwrap().get(key).cloned().unwrap_or_default())
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn appended_marks_resolve_into_segments() {
        let store = Arc::new(FakeStore::default());
        let log = Arc::new(AudioMarkLog::new(store));
        log.mark("call-1", 100, MarkType::ListenStart, 0).await.unwrap();
        log.mark("call-1", 2500, MarkType::IntentFinalized, 2).await.unwrap();

        let marks = log.all("call-1").await.unwrap();
        let segments = resolve_audio_segments(&marks);
        assert_eq!(segments, vec![AudioSegment { start_ms: 100, end_ms: Some(2500), reason: "completed".into() }]);
    }
}

//! Call-log sink port (C10, §4.10): "persist a call record via a stored
//! procedure or equivalent call-log sink." Kept as narrow as the other
//! ports — a single opaque record, no SQL/ORM types in the signature.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallLogError {
    #[error("call log sink unavailable: {0}")]
    Transport(String),
}

/// One finalized call, as written at `StasisEnd` (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub linked_id: String,
    pub caller: String,
    pub callee: String,
    pub bot_name: String,
    pub identity: Option<String>,
    pub turns: u32,
    pub successful_turns: u32,
    pub total_silences: u32,
    pub duration_seconds: f64,
    pub recording_path: Option<String>,
    pub transcript_path: Option<String>,
    pub ended_at_ms: i64,
}

#[async_trait]
pub trait CallLogSinkPort: Send + Sync {
    async fn persist(&self, record: CallRecord) -> Result<(), CallLogError>;
}

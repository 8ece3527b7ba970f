//! [`CallLogSinkPort`] implementation (C10, §4.10): pushes each finalized
//! call record as JSON onto a Redis list, the same connection-manager
//! pattern [`RedisStore`] uses for the resource-contract keys.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use voicebot_core::ports::{CallLogError, CallLogSinkPort, CallRecord};

const CALL_LOG_KEY: &str = "rut:call_log";

pub struct RedisCallLogSink {
    conn: ConnectionManager,
}

impl RedisCallLogSink {
    #[must_use]
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CallLogSinkPort for RedisCallLogSink {
    async fn persist(&self, record: CallRecord) -> Result<(), CallLogError> {
        let payload = serde_json::to_string(&record).map_err(|e| CallLogError::Transport(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(CALL_LOG_KEY, payload).await.map_err(|e| CallLogError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_log_key_is_namespaced_under_rut() {
        assert!(CALL_LOG_KEY.starts_with("rut:"));
    }
}

//! Redis-backed [`SharedStorePort`] (C3, §6): the literal `GET`/`SET
//! PX`/`DEL`/`RPUSH`/`LRANGE`/`EXPIRE` command set, nothing more.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use voicebot_core::ports::{SharedStorePort, StoreError};

/// Thin wrapper over a pooled Redis connection manager. Holds no
/// call-specific state — every key/TTL decision lives upstream in
/// `voicebot-engine`.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connects and verifies reachability before returning, the same way
    /// `SqliteSettingsRepository::ensure_table` fails fast at construction
    /// rather than on first use.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(|e| StoreError::Transport(e.to_string()))?;
        let conn = client.get_connection_manager().await.map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Shared handle to the underlying connection manager, for callers (e.g.
    /// the call-log sink) that want the same pooled connection.
    #[must_use]
    pub fn connection_manager(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl SharedStorePort for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl)).await.map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(key, value).await.map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.lrange(key, start as isize, stop as isize).await.map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl_secs(ttl)).await.map_err(|e| StoreError::Transport(e.to_string()))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_millis_converts_sub_second_durations() {
        assert_eq!(ttl_millis(Duration::from_millis(1500)), 1500);
    }

    #[test]
    fn ttl_secs_truncates_sub_second_remainder() {
        assert_eq!(ttl_secs(Duration::from_millis(2999)), 2);
    }

    #[test]
    fn ttl_millis_saturates_on_overflow() {
        assert_eq!(ttl_millis(Duration::MAX), u64::MAX);
    }
}

//! Shared key/value store port (C3, §6).
//!
//! Mirrors the literal Redis-shaped command set from §6: string `GET`/`SET
//! PX`/`DEL`, list `RPUSH`/`LRANGE`/`EXPIRE`. Kept narrow and storage-engine
//! agnostic the way the teacher's repository ports are narrow and
//! `sqlx`-agnostic.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store transport error: {0}")]
    Transport(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait SharedStorePort: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// `SET key value PX ttl`.
    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    async fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;
}

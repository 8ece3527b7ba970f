//! Shared key/value store adapter (C3, §6): Redis-backed
//! [`voicebot_core::ports::SharedStorePort`]. Key naming and TTL policy
//! belong to `voicebot-engine`; this crate only speaks the command set.

pub mod call_log;
pub mod redis_store;

pub use call_log::RedisCallLogSink;
pub use redis_store::RedisStore;

//! Webhook gateway port, consumed by `CALL_WEBHOOK` domain actions (§3, §4.7).

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook transport error: {0}")]
    Transport(String),
    #[error("webhook rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait WebhookPort: Send + Sync {
    /// Invokes a named webhook with a JSON payload, returning its JSON
    /// response on success.
    async fn call(&self, name: &str, payload: Value) -> Result<Value, WebhookError>;
}

//! Internal error types for the telephony control-interface client.
//!
//! These are internal to `voicebot-telephony` and mapped to
//! [`voicebot_core::ports::TelephonyError`] at the trait boundary.

use thiserror::Error;
use voicebot_core::ports::TelephonyError;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("control-interface request failed with status {status}: {path}")]
    RequestFailed { status: u16, path: String },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflicting resource state: {0}")]
    Conflict(String),

    #[error("event stream closed unexpectedly")]
    StreamClosed,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl From<TransportError> for TelephonyError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotFound(msg) => Self::NotFound(msg),
            TransportError::Conflict(msg) => Self::ConflictState(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

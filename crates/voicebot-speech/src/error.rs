//! Internal error type for the speech session client, mapped to
//! [`voicebot_core::ports::SpeechError`] at the trait boundary.

use thiserror::Error;
use voicebot_core::ports::SpeechError;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("provider reported an error: {0}")]
    Provider(String),

    #[error("response was cancelled")]
    Cancelled,

    #[error("session not connected")]
    NotConnected,

    #[error("server closed the connection")]
    Closed,
}

impl From<SessionError> for SpeechError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Provider(msg) => Self::Provider(msg),
            SessionError::Cancelled => Self::Cancelled,
            other => Self::Transport(other.to_string()),
        }
    }
}

use thiserror::Error;
use voicebot_core::ports::WebhookError;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no endpoint registered for webhook {0}")]
    UnknownWebhook(String),
    #[error("webhook responded with status {status}: {name}")]
    RequestFailed { name: String, status: u16 },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<ClientError> for WebhookError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::RequestFailed { name, status } if (400..500).contains(&status) => {
                Self::Rejected(format!("{name} returned {status}"))
            }
            other => Self::Transport(other.to_string()),
        }
    }
}

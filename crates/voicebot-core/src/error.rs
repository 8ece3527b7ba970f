//! Engine-wide error taxonomy (§7), mirroring the teacher's `CoreError`
//! composition: adapter-specific errors wrap into domain-specific error
//! enums, which wrap into one top-level error with `#[from]`.

use thiserror::Error;

use crate::domain::snoop::SnoopTransitionError;
use crate::ports::{RecordingError, SpeechError, StoreError, TelephonyError, WebhookError};

/// A forbidden transition, an STT-before-READY attempt, or an action the
/// lifecycle table denies (§7 `ContractViolation`).
#[derive(Debug, Error)]
pub enum ContractViolation {
    #[error("snoop transition rejected: {0}")]
    SnoopTransition(#[from] SnoopTransitionError),
    #[error("STT requested while snoop state is not READY: {0}")]
    SttBlockedSnoopState(String),
    #[error("action {action} not allowed in phase {phase}")]
    ActionNotAllowed { phase: String, action: String },
}

/// Domain returned no action in a critical phase, or contradictory flags
/// (§7 `DomainProtocolError`).
#[derive(Debug, Error)]
pub enum DomainProtocolError {
    #[error("domain returned no action in critical phase {phase} with non-empty transcript")]
    MissingAction { phase: String },
    #[error("should_hangup={should_hangup} is inconsistent with action {action:?}")]
    InconsistentHangup { should_hangup: bool, action: String },
}

/// Canonical engine error (§7). Every collaborator port's error type maps
/// into exactly one variant here via `#[from]`, the same shape as the
/// teacher's `CoreError`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("recoverable transport failure: {0}")]
    RecoverableTransport(String),

    #[error("channel gone: {0}")]
    ChannelGone(String),

    #[error(transparent)]
    Contract(#[from] ContractViolation),

    #[error(transparent)]
    DomainProtocol(#[from] DomainProtocolError),

    #[error("speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("media error: {0}")]
    Media(#[from] RecordingError),

    #[error("fatal initialization error: {0}")]
    FatalInit(String),
}

impl From<TelephonyError> for EngineError {
    fn from(err: TelephonyError) -> Self {
        match err {
            TelephonyError::NotFound(msg) => Self::ChannelGone(msg),
            TelephonyError::ConflictState(msg) | TelephonyError::Transport(msg) => {
                Self::RecoverableTransport(msg)
            }
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::RecoverableTransport(err.to_string())
    }
}

impl From<WebhookError> for EngineError {
    fn from(err: WebhookError) -> Self {
        Self::RecoverableTransport(err.to_string())
    }
}

//! Port definitions (trait abstractions) for external systems (C1, C2, C3,
//! C7 and the webhook gateway / recording segmenter collaborators).
//!
//! Ports define the interfaces the engine expects from infrastructure. They
//! contain no implementation details and use only domain types.
//!
//! # Design rules
//!
//! - No HTTP/WS client types, no SQL/Redis client types in any signature.
//! - Traits are minimal and intent-based, not implementation-leaking.

pub mod call_log;
pub mod domain;
pub mod recording;
pub mod speech;
pub mod store;
pub mod telephony;
pub mod webhook;

pub use call_log::{CallLogError, CallLogSinkPort, CallRecord};
pub use domain::{DomainError, DomainPort, DomainRegistry};
pub use recording::{RecordingError, RecordingHandle, RecordingSegmenterPort};
pub use speech::{AudioBuffer, AudioFormat, AudioFrame, SpeechError, SpeechPort, SpeechSessionConfig};
pub use store::{SharedStorePort, StoreError};
pub use telephony::{
    BridgeType, EventKind, Media, Playback, PlaybackEvent, PlaybackTarget, RecordOptions, Recording,
    SnoopSpec, TelephonyError, TelephonyEvent, TelephonyPort,
};
pub use webhook::{WebhookError, WebhookPort};

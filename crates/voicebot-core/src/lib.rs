//! Core domain types and port definitions for the voice-bot session engine.
//!
//! This crate holds only the data model (§3) and the trait boundaries
//! (§4.1-4.3, §4.7, §6) the engine expects from its infrastructure
//! collaborators. It has no knowledge of HTTP, WebSockets, or any concrete
//! key/value store — see `voicebot-telephony`, `voicebot-speech`, and
//! `voicebot-store` for those.

pub mod domain;
pub mod error;
pub mod ports;
pub mod settings;

pub use error::{ContractViolation, DomainProtocolError, EngineError};
pub use settings::{CallMode, Settings, SettingsError};

//! Speech Adapter (C2, §4.2, §6): realtime streaming session client against
//! the speech provider. Implements [`voicebot_core::ports::SpeechPort`];
//! nothing outside this crate touches `tokio-tungstenite` directly.

pub mod client;
pub mod error;
pub mod protocol;

pub use client::RealtimeSpeechClient;
pub use error::SessionError;

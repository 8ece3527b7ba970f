//! Telephony Adapter (C1, §4.1): REST + WebSocket facade over the switch's
//! control interface. Implements [`voicebot_core::ports::TelephonyPort`];
//! nothing outside this crate touches `reqwest` or `tokio-tungstenite`
//! directly.

pub mod client;
pub mod error;
pub mod events;
pub mod playback;
pub mod probe;
pub mod recording;
pub mod rest;

pub use client::AriTelephonyClient;
pub use error::TransportError;
pub use recording::FfmpegRecordingSegmenter;
pub use rest::RestClient;

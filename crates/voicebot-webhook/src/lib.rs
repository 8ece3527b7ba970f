//! Webhook gateway client (§3, §4.7): implements
//! [`voicebot_core::ports::WebhookPort`] for `CALL_WEBHOOK` domain actions.

pub mod client;
pub mod error;

pub use client::WebhookClient;
pub use error::ClientError;

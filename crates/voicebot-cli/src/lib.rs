//! Composition root for the voice-bot session engine: process config,
//! infrastructure wiring, and the call-accept loop. Mirrors `gglib_cli`'s
//! split between `config`, `bootstrap`, and dispatch — except dispatch here
//! is a single long-running call loop rather than a multi-subcommand CLI.

pub mod bootstrap;
pub mod call_loop;
pub mod config;
pub mod reference_bot;

pub use bootstrap::{bootstrap, BotTables, CliContext};
pub use config::CliArgs;

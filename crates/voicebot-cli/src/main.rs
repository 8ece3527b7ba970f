//! Process entry point.
//!
//! This is the ONLY place where infrastructure is wired together via
//! `bootstrap`. Everything else talks to ports.

use clap::Parser;

use voicebot_cli::{bootstrap, call_loop, CliArgs};

/// Bootstrap failures (bad URLs, unreachable switch/store) are a distinct
/// process outcome from a call-loop that simply ran until the event stream
/// closed — the composition root's `exit_codes` responsibility.
const EXIT_FATAL_INIT: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();

    let ctx = match bootstrap(&args).await {
        Ok(ctx) => ctx,
        Err(err) => {
            tracing::error!(error = %err, "fatal initialization error, not accepting calls");
            std::process::exit(EXIT_FATAL_INIT);
        }
    };

    tracing::info!(app = %ctx.telephony_app, "voicebot engine ready, accepting calls");
    call_loop::run(std::sync::Arc::new(ctx)).await;

    Ok(())
}

//! Call-accept loop: one [`TurnOrchestrator`] task per `StasisStart` (§4.1,
//! §4.5), the long-running equivalent of `gglib-axum`'s per-connection
//! task spawn.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::{error, info};
use voicebot_core::domain::{MarkType, Session, SnoopState};
use voicebot_core::ports::{AudioFormat, BridgeType, EventKind, SnoopSpec, SpeechPort, SpeechSessionConfig, TelephonyEvent};
use voicebot_engine::policies::{BargeInGate, DeepTurnGuard, HoldPolicy, SilencePolicy, TerminationPolicy, TransferDetector};
use voicebot_engine::{Finalizer, FinalizerDeps, TurnOrchestrator, TurnOrchestratorDeps};
use voicebot_speech::RealtimeSpeechClient;

use crate::bootstrap::CliContext;
use crate::reference_bot;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn default_speech_session_config() -> SpeechSessionConfig {
    SpeechSessionConfig {
        voice: "alloy".to_string(),
        language: "es".to_string(),
        model: "default".to_string(),
        instructions: String::new(),
        transcription_model: "default".to_string(),
        input_format: AudioFormat::MuLaw8k,
        output_format: AudioFormat::MuLaw8k,
    }
}

/// Subscribes to `StasisStart`/`StasisEnd` and spawns one task per call.
/// Runs until the telephony event stream closes.
pub async fn run(ctx: Arc<CliContext>) {
    let mut lifecycle_events = match ctx.telephony.subscribe(&[EventKind::StasisStart, EventKind::StasisEnd]).await {
        Ok(rx) => rx,
        Err(err) => {
            error!(error = %err, "failed to subscribe to telephony lifecycle events");
            return;
        }
    };

    while let Some(event) = lifecycle_events.recv().await {
        if let TelephonyEvent::StasisStart { channel_id, linked_id } = event {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                if let Err(err) = handle_call(&ctx, &channel_id, &linked_id).await {
                    error!(call = %linked_id, channel = %channel_id, error = %err, "call handling failed");
                }
            });
        }
    }
}

/// Bridges the channel, pins a snoop tap to it, and starts continuous
/// capture (§4.1, §4.3, §4.9). Must complete — and the contract must reach
/// `Ready` — before the turn loop's first `STT` attempt.
async fn setup_call_resources(ctx: &CliContext, channel_id: &str, linked_id: &str) -> anyhow::Result<()> {
    let bridge_id = ctx.telephony.create_bridge(BridgeType::Mixing).await?;
    ctx.telephony.add_channel_to_bridge(&bridge_id, channel_id).await?;

    let snoop_id = ctx
        .telephony
        .create_snoop(channel_id, SnoopSpec { spy: "in".to_string(), whisper: "none".to_string(), app: ctx.telephony_app.clone() })
        .await?;
    ctx.snoop_contracts.create(linked_id, &snoop_id, channel_id, now_ms()).await?;

    ctx.telephony.pin_snoop_to_bridge(&bridge_id, &snoop_id, 5).await?;
    ctx.snoop_contracts.transition(linked_id, SnoopState::Created, SnoopState::WaitingAst, now_ms()).await?;

    ctx.telephony.wait_for_audio_plane_ready(&snoop_id, Duration::from_secs(5)).await;
    ctx.snoop_contracts.transition(linked_id, SnoopState::WaitingAst, SnoopState::Ready, now_ms()).await?;

    ctx.recording_segmenter.start(linked_id, &snoop_id).await?;
    ctx.marks.mark(linked_id, 0, MarkType::RecordingStart, now_ms()).await.ok();

    Ok(())
}

async fn handle_call(ctx: &CliContext, channel_id: &str, linked_id: &str) -> anyhow::Result<()> {
    if let Err(err) = setup_call_resources(ctx, channel_id, linked_id).await {
        error!(call = %linked_id, error = %err, "failed to set up call resources; hanging up");
        let _ = ctx.telephony.hangup(channel_id).await;
        return Err(err);
    }

    let bot_name = reference_bot::BOT_NAME;
    let bot_tables = ctx
        .bot_tables
        .get(bot_name)
        .ok_or_else(|| anyhow::anyhow!("no phase/lifecycle table registered for bot {bot_name}"))?
        .clone();
    let domain = ctx
        .domain_registry
        .resolve(reference_bot::DOMAIN_NAME, bot_name)
        .ok_or_else(|| anyhow::anyhow!("no domain registered for bot {bot_name}"))?;

    let speech: Arc<dyn SpeechPort> = Arc::new(RealtimeSpeechClient::new(ctx.speech_ws_url.clone()));
    speech.connect(default_speech_session_config()).await.context("failed to connect speech session")?;

    let events = ctx
        .telephony
        .subscribe(&TurnOrchestrator::required_event_kinds())
        .await
        .map_err(|err| anyhow::anyhow!("failed to subscribe to call-scoped events: {err}"))?;

    let settings = ctx.settings.clone();
    let hold_policy = match &settings.music_class {
        Some(class) => HoldPolicy::enabled(class.clone()).with_max_duration_ms(settings.effective_hold_duration_ms()),
        None => HoldPolicy::disabled(),
    };
    let deps = TurnOrchestratorDeps {
        telephony: Arc::clone(&ctx.telephony),
        speech,
        store: Arc::clone(&ctx.store),
        webhook: Arc::clone(&ctx.webhook),
        marks: Arc::clone(&ctx.marks),
        snoop_contracts: Arc::clone(&ctx.snoop_contracts),
        audio_stager: Arc::clone(&ctx.audio_stager),
        events: Mutex::new(events),
    };

    let orchestrator = TurnOrchestrator::new(
        deps,
        bot_tables.phase_table,
        bot_tables.lifecycle_table,
        settings.clone(),
        SilencePolicy::new(settings.effective_max_silent_turns()),
        hold_policy,
        TerminationPolicy::default(),
        TransferDetector::new(settings.transfer_queue.clone().unwrap_or_default()),
        BargeInGate::new(voicebot_core::domain::InterruptPolicy::default(), Duration::from_millis(settings.effective_talking_debounce_ms())),
        DeepTurnGuard::new(reference_bot::CAPTURE, reference_bot::COMPLETE),
    );

    let start_ts = now_ms();
    let mut session = Session::new(linked_id, channel_id, channel_id, bot_name, reference_bot::GREETING, start_ts);
    let mut identity_captured = false;

    info!(call = %linked_id, channel = %channel_id, "call accepted");
    let outcome = orchestrator.run(&mut session, channel_id, &mut identity_captured, domain.as_ref()).await;
    info!(call = %linked_id, outcome = ?outcome, "call finished");

    ctx.snoop_contracts.destroy(linked_id, now_ms()).await.ok();

    let finalizer = Finalizer::new(FinalizerDeps {
        call_log: Arc::clone(&ctx.call_log),
        voicebot_audio_path: settings.voicebot_audio_path.clone().unwrap_or_default().into(),
    });
    let day = chrono::Utc::now().format("%Y-%m-%d").to_string();
    finalizer.finalize(&session, None, now_ms(), &day, None, None).await;

    Ok(())
}

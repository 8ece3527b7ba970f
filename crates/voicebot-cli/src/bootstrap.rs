//! CLI bootstrap — the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together:
//! the telephony/speech/store/webhook adapters, the recording segmenter,
//! the call-log sink, and the domain registry are all constructed here.
//! Everything downstream receives `Arc<dyn Port>` handles, never a
//! concrete adapter type.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use url::Url;

use voicebot_core::domain::{LifecycleTable, PhaseTable};
use voicebot_core::ports::{AudioFormat, CallLogSinkPort, DomainRegistry, SharedStorePort, TelephonyPort, WebhookPort};
use voicebot_core::settings::Settings;
use voicebot_engine::{AudioMarkLog, AudioStager, RecordingSegmenter, SnoopContracts};
use voicebot_store::RedisCallLogSink;
use voicebot_telephony::AriTelephonyClient;
use voicebot_webhook::WebhookClient;

use crate::config::CliArgs;
use crate::reference_bot;

/// Per-bot conversation shape: phase table + lifecycle contract table.
///
/// Real deployments register one entry per domain-package bot at startup;
/// this repo ships only [`reference_bot`] as a smoke-test fixture.
#[derive(Clone)]
pub struct BotTables {
    pub phase_table: PhaseTable,
    pub lifecycle_table: LifecycleTable,
}

/// Fully composed process context, shared across every call the process
/// accepts.
pub struct CliContext {
    pub telephony: Arc<dyn TelephonyPort>,
    pub store: Arc<dyn SharedStorePort>,
    pub webhook: Arc<dyn WebhookPort>,
    pub call_log: Arc<dyn CallLogSinkPort>,
    pub marks: Arc<AudioMarkLog>,
    pub snoop_contracts: Arc<SnoopContracts>,
    pub audio_stager: Arc<AudioStager>,
    pub recording_segmenter: Arc<RecordingSegmenter>,
    pub domain_registry: Arc<DomainRegistry>,
    pub bot_tables: HashMap<String, BotTables>,
    pub settings: Settings,
    pub speech_ws_url: Url,
    pub telephony_app: String,
}

/// Wires every adapter crate into a [`CliContext`] (§A composition-root
/// responsibility).
pub async fn bootstrap(args: &CliArgs) -> Result<CliContext> {
    let rest_url = Url::parse(&args.telephony_rest_url).context("invalid TELEPHONY_REST_URL")?;
    let ws_url = Url::parse(&args.telephony_ws_url).context("invalid TELEPHONY_WS_URL")?;
    let speech_ws_url = Url::parse(&args.speech_ws_url).context("invalid SPEECH_WS_URL")?;

    let telephony_client = AriTelephonyClient::connect(rest_url, ws_url, &args.telephony_app)
        .await
        .context("failed to connect to the telephony control interface")?;
    let rest_client = telephony_client.rest_client();
    let telephony: Arc<dyn TelephonyPort> = Arc::new(telephony_client);

    let redis_store = voicebot_store::RedisStore::connect(&args.shared_store_addr)
        .await
        .context("failed to connect to the shared store")?;
    let call_log: Arc<dyn CallLogSinkPort> = Arc::new(RedisCallLogSink::new(redis_store.connection_manager()));
    let store: Arc<dyn SharedStorePort> = Arc::new(redis_store);

    let webhook: Arc<dyn WebhookPort> = Arc::new(WebhookClient::new(HashMap::new()));

    let marks = Arc::new(AudioMarkLog::new(Arc::clone(&store)));
    let snoop_contracts = Arc::new(SnoopContracts::new(Arc::clone(&store)));

    tokio::fs::create_dir_all(&args.voicebot_audio_path)
        .await
        .with_context(|| format!("failed to create voicebot_audio_path {}", args.voicebot_audio_path))?;
    // Matches `default_speech_session_config`'s negotiated output format.
    let audio_stager = Arc::new(AudioStager::new(args.voicebot_audio_path.clone(), AudioFormat::MuLaw8k));

    let ffmpeg_backend = Arc::new(voicebot_telephony::FfmpegRecordingSegmenter::new(rest_client, args.ffmpeg_path.clone()));
    let recording_segmenter = Arc::new(RecordingSegmenter::new(ffmpeg_backend, Arc::clone(&marks)));

    let mut domain_registry = DomainRegistry::new();
    domain_registry.register(reference_bot::DOMAIN_NAME, reference_bot::BOT_NAME, Arc::new(reference_bot::EchoDemoDomain));
    let domain_registry = Arc::new(domain_registry);

    let mut bot_tables = HashMap::new();
    bot_tables.insert(
        reference_bot::BOT_NAME.to_string(),
        BotTables { phase_table: reference_bot::phase_table(), lifecycle_table: reference_bot::lifecycle_table() },
    );

    Ok(CliContext {
        telephony,
        store,
        webhook,
        call_log,
        marks,
        snoop_contracts,
        audio_stager,
        recording_segmenter,
        domain_registry,
        bot_tables,
        settings: args.to_settings(),
        speech_ws_url,
        telephony_app: args.telephony_app.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_tables_clone_is_independent_of_the_source_registration() {
        let tables = BotTables { phase_table: reference_bot::phase_table(), lifecycle_table: reference_bot::lifecycle_table() };
        let cloned = tables.clone();
        assert!(cloned.phase_table.contains(reference_bot::GREETING));
        assert!(cloned.lifecycle_table.teardown_allowed(reference_bot::COMPLETE));
    }
}

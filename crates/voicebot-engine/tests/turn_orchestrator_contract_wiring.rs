//! Review follow-up: the lifecycle evaluator, the one-shot re-prompt marker,
//! hold-duration tracking, goodbye-phrase detection, and assistant-side
//! transfer/asset wiring must all be reachable from the turn loop, not just
//! unit-tested in isolation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use voicebot_core::domain::{
    Action, DomainAction, DomainContext, DomainResult, LifecycleContractEntry, LifecycleTable, Phase, PhaseKind,
    PhaseTable, Session,
};
use voicebot_core::ports::{
    AudioBuffer, AudioFormat, AudioFrame, BridgeType, DomainError, DomainPort, Media, Playback, PlaybackEvent,
    PlaybackTarget, Recording, RecordOptions, SharedStorePort, SnoopSpec, SpeechError, SpeechPort,
    SpeechSessionConfig, StoreError, TelephonyError, TelephonyEvent, TelephonyPort, WebhookError, WebhookPort,
};
use voicebot_core::settings::Settings;
use voicebot_engine::policies::{BargeInGate, DeepTurnGuard, HoldPolicy, SilencePolicy, TerminationPolicy, TransferDetector};
use voicebot_engine::{AudioMarkLog, AudioStager, EngineOutcome, SnoopContracts, TurnOrchestrator, TurnOrchestratorDeps};

#[derive(Default)]
struct FakeStore {
    data: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SharedStorePort for FakeStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }
    async fn set_px(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), StoreError> {
        self.data.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }
    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
    async fn rpush(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Ok(())
    }
    async fn lrange(&self, _key: &str, _start: i64, _stop: i64) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
        Ok(())
    }
}

struct ImmediatePlayback;

#[async_trait]
impl Playback for ImmediatePlayback {
    async fn stop(&self) -> Result<(), TelephonyError> {
        Ok(())
    }
    async fn wait(&self) -> PlaybackEvent {
        PlaybackEvent::Finished
    }
}

/// Always alive. Records whatever `recording_path` points at (so
/// `recording_qualifies` can be steered below or above the minimum-bytes
/// threshold), plays instantly, and counts start/stop MoH + dialplan calls.
#[derive(Default)]
struct FakeTelephony {
    recording_path: Mutex<Option<String>>,
    stop_moh_calls: AtomicU32,
    start_moh_calls: AtomicU32,
    plays: Mutex<Vec<String>>,
    dialplan_calls: Mutex<Vec<String>>,
}

#[async_trait]
impl TelephonyPort for FakeTelephony {
    async fn is_alive(&self, _channel_id: &str) -> Result<bool, TelephonyError> {
        Ok(true)
    }
    async fn hangup(&self, _channel_id: &str) -> Result<(), TelephonyError> {
        Ok(())
    }
    async fn continue_in_dialplan(&self, _channel_id: &str, _context: &str, extension: &str, _priority: u32) -> Result<(), TelephonyError> {
        self.dialplan_calls.lock().unwrap().push(extension.to_string());
        Ok(())
    }
    async fn play(&self, _target: PlaybackTarget, media: Media) -> Result<Box<dyn Playback>, TelephonyError> {
        self.plays.lock().unwrap().push(media.uri);
        Ok(Box::new(ImmediatePlayback))
    }
    async fn record(&self, _channel_id: &str, _opts: RecordOptions) -> Result<Recording, TelephonyError> {
        let path = self.recording_path.lock().unwrap().clone().unwrap_or_default();
        Ok(Recording { name: "rec".into(), path })
    }
    async fn create_bridge(&self, _bridge_type: BridgeType) -> Result<String, TelephonyError> {
        Ok("bridge-1".into())
    }
    async fn add_channel_to_bridge(&self, _bridge_id: &str, _channel_id: &str) -> Result<(), TelephonyError> {
        Ok(())
    }
    async fn create_snoop(&self, _parent_channel_id: &str, _spec: SnoopSpec) -> Result<String, TelephonyError> {
        Ok("snoop-1".into())
    }
    async fn start_moh(&self, _channel_id: &str, _music_class: &str) -> Result<(), TelephonyError> {
        self.start_moh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn stop_moh(&self, _channel_id: &str) -> Result<(), TelephonyError> {
        self.stop_moh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn subscribe(&self, _kinds: &[voicebot_core::ports::EventKind]) -> Result<mpsc::Receiver<TelephonyEvent>, TelephonyError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }
    async fn wait_for_audio_plane_ready(&self, _channel_id: &str, _timeout: Duration) -> bool {
        true
    }
    async fn pin_snoop_to_bridge(&self, _bridge_id: &str, _channel_id: &str, _max_retries: u32) -> Result<(), TelephonyError> {
        Ok(())
    }
}

struct FakeSpeech;

#[async_trait]
impl SpeechPort for FakeSpeech {
    async fn connect(&self, _config: SpeechSessionConfig) -> Result<(), SpeechError> {
        Ok(())
    }
    async fn send_audio_and_wait(&self, _frames: Vec<AudioFrame>) -> Result<AudioBuffer, SpeechError> {
        Ok(AudioBuffer(Vec::new()))
    }
    async fn transcribe_audio_only(&self, _frames: Vec<AudioFrame>) -> Result<String, SpeechError> {
        Ok(String::new())
    }
    async fn synthesize_speech(&self, _text: &str) -> Result<AudioBuffer, SpeechError> {
        Ok(AudioBuffer(vec![0u8; 16]))
    }
    async fn send_system_text(&self, _text: &str) -> Result<AudioBuffer, SpeechError> {
        Ok(AudioBuffer(Vec::new()))
    }
    async fn cancel_current_response(&self, _reason: &str) -> Result<(), SpeechError> {
        Ok(())
    }
    async fn set_incremental(&self, _on: bool) -> Result<(), SpeechError> {
        Ok(())
    }
    async fn has_in_flight_response(&self) -> bool {
        false
    }
}

/// Fails the test if `synthesize_speech` is ever invoked — used to prove
/// `DomainResult.audio_file` bypasses synthesis entirely.
struct PanicIfSynthesizedSpeech;

#[async_trait]
impl SpeechPort for PanicIfSynthesizedSpeech {
    async fn connect(&self, _config: SpeechSessionConfig) -> Result<(), SpeechError> {
        Ok(())
    }
    async fn send_audio_and_wait(&self, _frames: Vec<AudioFrame>) -> Result<AudioBuffer, SpeechError> {
        Ok(AudioBuffer(Vec::new()))
    }
    async fn transcribe_audio_only(&self, _frames: Vec<AudioFrame>) -> Result<String, SpeechError> {
        Ok(String::new())
    }
    async fn synthesize_speech(&self, _text: &str) -> Result<AudioBuffer, SpeechError> {
        panic!("synthesize_speech must not be called when DomainResult.audio_file is present");
    }
    async fn send_system_text(&self, _text: &str) -> Result<AudioBuffer, SpeechError> {
        Ok(AudioBuffer(Vec::new()))
    }
    async fn cancel_current_response(&self, _reason: &str) -> Result<(), SpeechError> {
        Ok(())
    }
    async fn set_incremental(&self, _on: bool) -> Result<(), SpeechError> {
        Ok(())
    }
    async fn has_in_flight_response(&self) -> bool {
        false
    }
}

struct FakeWebhook;

#[async_trait]
impl WebhookPort for FakeWebhook {
    async fn call(&self, _name: &str, _payload: serde_json::Value) -> Result<serde_json::Value, WebhookError> {
        Ok(serde_json::Value::Null)
    }
}

/// Should never run: these scenarios never reach voice detection.
struct UnreachableDomain;

#[async_trait]
impl DomainPort for UnreachableDomain {
    async fn process(&self, _ctx: DomainContext) -> Result<DomainResult, DomainError> {
        panic!("domain must not be consulted in this scenario");
    }
}

/// Returns one canned [`DomainResult`] per call, in registration order.
struct ScriptedDomain {
    results: Mutex<Vec<DomainResult>>,
}

impl ScriptedDomain {
    fn new(results: Vec<DomainResult>) -> Self {
        Self { results: Mutex::new(results) }
    }
}

#[async_trait]
impl DomainPort for ScriptedDomain {
    async fn process(&self, _ctx: DomainContext) -> Result<DomainResult, DomainError> {
        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            panic!("ScriptedDomain exhausted its script");
        }
        Ok(results.remove(0))
    }
}

const SILENT_PHASE: &str = "ROUTER";
const LISTEN_PHASE: &str = "CAPTURE";

fn silent_phase_table() -> PhaseTable {
    let mut table = PhaseTable::new();
    table.register(Phase::new(SILENT_PHASE, PhaseKind::Silent));
    table
}

fn listen_phase_table() -> PhaseTable {
    let mut table = PhaseTable::new();
    table.register(Phase::new(LISTEN_PHASE, PhaseKind::Listen));
    table
}

fn webhook_reprompt_key(linked_id: &str) -> String {
    format!("rut:webhook:rejected:{linked_id}")
}

#[allow(clippy::too_many_arguments)]
fn orchestrator(
    telephony: Arc<FakeTelephony>,
    speech: Arc<dyn SpeechPort>,
    store: Arc<FakeStore>,
    phase_table: PhaseTable,
    lifecycle_table: LifecycleTable,
    settings: Settings,
    hold_policy: HoldPolicy,
    transfer_queue: &str,
) -> TurnOrchestrator {
    let (_tx, rx) = mpsc::channel(1);
    let telephony_port: Arc<dyn TelephonyPort> = telephony;
    let store_port: Arc<dyn SharedStorePort> = store;
    let deps = TurnOrchestratorDeps {
        telephony: telephony_port,
        speech,
        store: Arc::clone(&store_port),
        webhook: Arc::new(FakeWebhook),
        marks: Arc::new(AudioMarkLog::new(Arc::clone(&store_port))),
        snoop_contracts: Arc::new(SnoopContracts::new(Arc::clone(&store_port))),
        audio_stager: Arc::new(AudioStager::new(std::env::temp_dir(), AudioFormat::MuLaw8k)),
        events: tokio::sync::Mutex::new(rx),
    };
    TurnOrchestrator::new(
        deps,
        phase_table,
        lifecycle_table,
        settings,
        SilencePolicy::new(3),
        hold_policy,
        TerminationPolicy::default(),
        TransferDetector::new(transfer_queue),
        BargeInGate::new(voicebot_core::domain::InterruptPolicy::default(), Duration::from_millis(400)),
        DeepTurnGuard::new("CAPTURE", "COMPLETE"),
    )
}

#[tokio::test]
async fn play_denied_by_the_lifecycle_table_is_never_sent_to_the_switch() {
    let telephony = Arc::new(FakeTelephony::default());
    let store = Arc::new(FakeStore::default());

    let mut lifecycle = LifecycleTable::new();
    lifecycle.register(SILENT_PHASE, LifecycleContractEntry::default()); // Play not in `allow`

    let domain = ScriptedDomain::new(vec![DomainResult::say("hola")]);
    let orch = orchestrator(
        Arc::clone(&telephony),
        Arc::new(FakeSpeech),
        store,
        silent_phase_table(),
        lifecycle,
        Settings::with_defaults(),
        HoldPolicy::disabled(),
        "support",
    );

    let mut session = Session::new("call-1", "chan-1", "chan-1", "bot", SILENT_PHASE, 0);
    let mut identity_captured = false;
    let outcome = orch.run(&mut session, "chan-1", &mut identity_captured, &domain).await;

    assert_eq!(outcome, EngineOutcome::Terminated);
    assert!(session.terminated);
    assert!(telephony.plays.lock().unwrap().is_empty(), "the switch must never see a Play it wasn't allowed to attempt");
}

#[tokio::test]
async fn one_shot_reprompt_marker_unlocks_play_once_then_is_deleted() {
    let telephony = Arc::new(FakeTelephony::default());
    let store = Arc::new(FakeStore::default());
    let linked_id = "call-2";
    store.data.lock().unwrap().insert(webhook_reprompt_key(linked_id), "1".to_string());

    let mut lifecycle = LifecycleTable::new();
    lifecycle.register(SILENT_PHASE, LifecycleContractEntry::default().deny(Action::Play));

    let domain = ScriptedDomain::new(vec![
        DomainResult::say("hola"),
        DomainResult { action: Some(DomainAction::EndCall { reason: "done".into(), text: None }), should_hangup: true, ..Default::default() },
    ]);
    let orch = orchestrator(
        Arc::clone(&telephony),
        Arc::new(FakeSpeech),
        Arc::clone(&store),
        silent_phase_table(),
        lifecycle,
        Settings::with_defaults(),
        HoldPolicy::disabled(),
        "support",
    );

    let mut session = Session::new(linked_id, "chan-2", "chan-2", "bot", SILENT_PHASE, 0);
    let mut identity_captured = false;
    let outcome = orch.run(&mut session, "chan-2", &mut identity_captured, &domain).await;

    assert_eq!(outcome, EngineOutcome::Terminated);
    assert_eq!(telephony.plays.lock().unwrap().len(), 1, "the first Play should have been allowed by the one-shot marker");
    assert!(store.data.lock().unwrap().get(&webhook_reprompt_key(linked_id)).is_none(), "the marker must be consumed after use");
}

#[tokio::test]
async fn hold_exit_uses_real_elapsed_time_not_a_hardcoded_zero() {
    let dir = std::env::temp_dir().join(format!("hold-test-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let small_clip = dir.join("tiny.wav");
    tokio::fs::write(&small_clip, vec![0u8; 16]).await.unwrap();

    let telephony = Arc::new(FakeTelephony::default());
    *telephony.recording_path.lock().unwrap() = Some(small_clip.display().to_string());
    let store = Arc::new(FakeStore::default());

    let mut lifecycle = LifecycleTable::new();
    lifecycle.register(LISTEN_PHASE, LifecycleContractEntry::allowing([Action::Record, Action::StartStt]));

    let store_port: Arc<dyn SharedStorePort> = Arc::clone(&store);
    let snoop_contracts = SnoopContracts::new(store_port);
    snoop_contracts.create("call-3", "snoop-3", "chan-3", 0).await.unwrap();
    snoop_contracts.transition("call-3", voicebot_core::domain::SnoopState::Created, voicebot_core::domain::SnoopState::WaitingAst, 0).await.unwrap();
    snoop_contracts.transition("call-3", voicebot_core::domain::SnoopState::WaitingAst, voicebot_core::domain::SnoopState::Ready, 0).await.unwrap();

    let hold_policy = HoldPolicy::enabled("default").with_max_duration_ms(100);

    let mut settings = Settings::with_defaults();
    settings.min_recording_bytes = Some(4_000);

    let orch = orchestrator(
        Arc::clone(&telephony),
        Arc::new(FakeSpeech),
        Arc::clone(&store),
        listen_phase_table(),
        lifecycle,
        settings,
        hold_policy,
        "support",
    );

    let mut session = Session::new("call-3", "chan-3", "chan-3", "bot", LISTEN_PHASE, 0);
    session.in_hold = true;
    session.hold_entered_at_ms = Some(-10_000_000); // far enough in the past to already exceed 100ms
    let mut identity_captured = false;

    let _ = orch.run(&mut session, "chan-3", &mut identity_captured, &UnreachableDomain).await;

    assert_eq!(
        telephony.stop_moh_calls.load(Ordering::SeqCst),
        1,
        "a stale hold_entered_at_ms should have produced a non-zero elapsed duration and triggered the timeout exit on the first iteration"
    );
    assert!(!session.in_hold);
    assert!(session.hold_entered_at_ms.is_none());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn goodbye_phrase_in_assistant_text_terminates_without_an_end_call_action() {
    let telephony = Arc::new(FakeTelephony::default());
    let store = Arc::new(FakeStore::default());

    let mut lifecycle = LifecycleTable::new();
    lifecycle.register(SILENT_PHASE, LifecycleContractEntry::allowing([Action::Play]));

    let domain = ScriptedDomain::new(vec![DomainResult::say("Fue un placer atenderle, que tenga un buen día.")]);
    let orch = orchestrator(
        Arc::clone(&telephony),
        Arc::new(FakeSpeech),
        store,
        silent_phase_table(),
        lifecycle,
        Settings::with_defaults(),
        HoldPolicy::disabled(),
        "support",
    );

    let mut session = Session::new("call-4", "chan-4", "chan-4", "bot", SILENT_PHASE, 0);
    let mut identity_captured = false;
    let outcome = orch.run(&mut session, "chan-4", &mut identity_captured, &domain).await;

    assert_eq!(outcome, EngineOutcome::Terminated);
    assert!(session.terminated);
    assert_eq!(telephony.plays.lock().unwrap().len(), 1, "the line is spoken once, then finalize only waits out the tail");
}

#[tokio::test]
async fn transfer_phrase_in_assistant_text_triggers_dialplan_handoff() {
    let telephony = Arc::new(FakeTelephony::default());
    let store = Arc::new(FakeStore::default());

    let mut lifecycle = LifecycleTable::new();
    lifecycle.register(SILENT_PHASE, LifecycleContractEntry::allowing([Action::Play, Action::Transfer]));

    let domain = ScriptedDomain::new(vec![DomainResult::say("Permítame comunicarlo con un operador.")]);
    let orch = orchestrator(
        Arc::clone(&telephony),
        Arc::new(FakeSpeech),
        store,
        silent_phase_table(),
        lifecycle,
        Settings::with_defaults(),
        HoldPolicy::disabled(),
        "support_queue",
    );

    let mut session = Session::new("call-5", "chan-5", "chan-5", "bot", SILENT_PHASE, 0);
    let mut identity_captured = false;
    let outcome = orch.run(&mut session, "chan-5", &mut identity_captured, &domain).await;

    assert_eq!(outcome, EngineOutcome::Terminated);
    assert!(session.terminated);
    assert_eq!(telephony.plays.lock().unwrap().len(), 1);
    assert_eq!(telephony.dialplan_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn domain_supplied_audio_file_plays_directly_without_synthesis() {
    let telephony = Arc::new(FakeTelephony::default());
    let store = Arc::new(FakeStore::default());

    let mut lifecycle = LifecycleTable::new();
    lifecycle.register(SILENT_PHASE, LifecycleContractEntry::allowing([Action::Play]));

    let domain = ScriptedDomain::new(vec![
        DomainResult { tts_text: Some("Bienvenido.".to_string()), audio_file: Some("welcome_tone".to_string()), ..Default::default() },
        DomainResult { action: Some(DomainAction::EndCall { reason: "done".into(), text: None }), should_hangup: true, ..Default::default() },
    ]);
    let orch = orchestrator(
        Arc::clone(&telephony),
        Arc::new(PanicIfSynthesizedSpeech),
        store,
        silent_phase_table(),
        lifecycle,
        Settings::with_defaults(),
        HoldPolicy::disabled(),
        "support",
    );

    let mut session = Session::new("call-6", "chan-6", "chan-6", "bot", SILENT_PHASE, 0);
    let mut identity_captured = false;
    let outcome = orch.run(&mut session, "chan-6", &mut identity_captured, &domain).await;

    assert_eq!(outcome, EngineOutcome::Terminated);
    assert_eq!(telephony.plays.lock().unwrap().clone(), vec!["sound:welcome_tone".to_string()]);
}

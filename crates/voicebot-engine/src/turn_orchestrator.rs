//! Turn Orchestrator (C5, §4.5): the heart of the engine. One task per
//! session, running until `session.terminated` or `turn >= maxTurns`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use voicebot_core::domain::{
    Action, DomainAction, DomainContext, DomainResult, InterruptPolicy, LifecycleTable, MarkType, PhaseKind, PhaseTable, Role, Session,
};
use voicebot_core::error::{ContractViolation, DomainProtocolError, EngineError};
use voicebot_core::ports::{
    AudioFrame, DomainPort, EventKind, Media, PlaybackEvent, PlaybackTarget, RecordOptions, SharedStorePort,
    SpeechPort, TelephonyEvent, TelephonyPort, WebhookPort,
};
use voicebot_core::domain::SnoopState;
use voicebot_core::settings::Settings;

use crate::audio_staging::AudioStager;
use crate::phase_manager::{PhaseManager, TransitionReason};
use crate::policies::{
    AntiReplayGuard, BargeInGate, DeepTurnGuard, HoldPolicy, SilenceAction, SilencePolicy, TerminationPolicy,
    TransferDetector,
};
use crate::recording_segmenter::AudioMarkLog;
use crate::resource_contracts::SnoopContracts;

/// Outcome of one turn-loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    Continue,
    Terminated,
    SwapEngine(String),
}

pub struct TurnOrchestratorDeps {
    pub telephony: Arc<dyn TelephonyPort>,
    pub speech: Arc<dyn SpeechPort>,
    pub store: Arc<dyn SharedStorePort>,
    pub webhook: Arc<dyn WebhookPort>,
    pub marks: Arc<AudioMarkLog>,
    pub snoop_contracts: Arc<SnoopContracts>,
    pub audio_stager: Arc<AudioStager>,
    /// Channel-scoped events (`ChannelTalkingStarted` in particular), used
    /// only to gate barge-in during interruptible playback.
    pub events: Mutex<mpsc::Receiver<TelephonyEvent>>,
}

pub struct TurnOrchestrator {
    deps: TurnOrchestratorDeps,
    phase_table: PhaseTable,
    lifecycle: LifecycleTable,
    settings: Settings,
    silence_policy: SilencePolicy,
    hold_policy: HoldPolicy,
    termination_policy: TerminationPolicy,
    anti_replay: AntiReplayGuard,
    transfer_detector: TransferDetector,
    barge_in: BargeInGate,
    deep_turn_guard: DeepTurnGuard,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Key for the one-shot re-prompt exception (§4.3): set when a webhook
/// rejects, consumed (and deleted) the next time `Play` would otherwise be
/// denied by the lifecycle table.
fn webhook_reprompt_key(linked_id: &str) -> String {
    format!("rut:webhook:rejected:{linked_id}")
}

impl TurnOrchestrator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        deps: TurnOrchestratorDeps,
        phase_table: PhaseTable,
        lifecycle: LifecycleTable,
        settings: Settings,
        silence_policy: SilencePolicy,
        hold_policy: HoldPolicy,
        termination_policy: TerminationPolicy,
        transfer_detector: TransferDetector,
        barge_in: BargeInGate,
        deep_turn_guard: DeepTurnGuard,
    ) -> Self {
        Self {
            deps,
            phase_table,
            lifecycle,
            settings,
            silence_policy,
            hold_policy,
            termination_policy,
            anti_replay: AntiReplayGuard,
            transfer_detector,
            barge_in,
            deep_turn_guard,
        }
    }

    /// Drives `session` to completion: record, transcribe, consult the
    /// domain, synthesize, play, repeat (§4.5). Returns the terminal reason.
    pub async fn run(&self, session: &mut Session, channel_id: &str, identity_captured: &mut bool, domain: &dyn DomainPort) -> EngineOutcome {
        let mut skip_user_input = false;

        loop {
            if session.terminated || session.turn >= self.settings.effective_max_turns() {
                if !session.terminated {
                    let text = "Hemos llegado al límite de turnos. Hasta luego.";
                    let media = self.synthesize_media(&session.linked_id, text).await;
                    self.termination_policy.finalize(self.deps.telephony.as_ref(), session, channel_id, Some(media), now_ms()).await;
                }
                return EngineOutcome::Terminated;
            }

            match self.run_iteration(session, channel_id, identity_captured, domain, &mut skip_user_input).await {
                Ok(EngineOutcome::Continue) => {}
                Ok(other) => return other,
                Err(err) => {
                    warn!(call = %session.linked_id, error = %err, "turn iteration failed; terminating defensively");
                    session.terminate(now_ms());
                    return EngineOutcome::Terminated;
                }
            }
        }
    }

    async fn run_iteration(
        &self,
        session: &mut Session,
        channel_id: &str,
        identity_captured: &mut bool,
        domain: &dyn DomainPort,
        skip_user_input: &mut bool,
    ) -> Result<EngineOutcome, EngineError> {
        // 1. Guards.
        if session.terminated {
            return Ok(EngineOutcome::Terminated);
        }
        if !self.deps.telephony.is_alive(channel_id).await.unwrap_or(false) {
            session.terminate(now_ms());
            return Ok(EngineOutcome::Terminated);
        }

        let phase = self.phase_table.get(&session.current_phase);
        let is_silent_phase = phase.is_some_and(voicebot_core::domain::Phase::is_silent)
            || self.settings.legacy_silent_phases.iter().any(|p| p == &session.current_phase);

        // 2. Phase consult / skip-input.
        if is_silent_phase || *skip_user_input {
            *skip_user_input = false;
            let result = self.consult_domain(session, String::new(), domain).await?;
            return self.apply_domain_result(session, channel_id, result, identity_captured, skip_user_input).await;
        }

        // 3. Hold policy.
        if self.hold_policy.should_enter(session.consecutive_silences, session.in_hold) {
            self.check_action(&session.current_phase, Action::StartMoh)?;
            let _ = self.deps.telephony.start_moh(channel_id, &self.hold_policy.music_class).await;
            session.in_hold = true;
            session.hold_entered_at_ms = Some(now_ms());
        }

        // 4. Record user turn.
        self.check_action(&session.current_phase, Action::Record)?;
        self.check_action(&session.current_phase, Action::StartStt)?;
        self.deps.marks.mark(&session.linked_id, self.offset_ms(session), MarkType::ListenStart, now_ms()).await.ok();

        let snoop_state = self.deps.snoop_contracts.get(&session.linked_id).await.ok().flatten().map(|c| c.state);
        if snoop_state != Some(SnoopState::Ready) {
            return Err(EngineError::from(ContractViolation::SttBlockedSnoopState(format!("{snoop_state:?}"))));
        }

        let opts = RecordOptions {
            format: "wav".to_string(),
            max_duration_ms: self.settings.effective_max_recording_ms(),
            max_silence_ms: (self.settings.effective_max_silence_seconds() * 1000.0) as u64,
            beep: false,
        };
        let recording = self.deps.telephony.record(channel_id, opts).await;
        let recording_path = recording.as_ref().ok().map(|r| r.path.clone());
        let heard_speech = recording.is_ok() && self.recording_qualifies(&recording_path).await;

        if self.hold_policy.enabled && session.in_hold {
            let elapsed = session
                .hold_entered_at_ms
                .map_or(Duration::from_millis(0), |entered| Duration::from_millis((now_ms() - entered).max(0) as u64));
            if self.hold_policy.should_exit(heard_speech, elapsed) {
                let _ = self.deps.telephony.stop_moh(channel_id).await;
                session.in_hold = false;
                session.hold_entered_at_ms = None;
            }
        }

        // 5. Silence policy evaluation.
        if !heard_speech {
            session.increment_silence();
            return match self.silence_policy.evaluate(session.consecutive_silences) {
                SilenceAction::Prompt { message } => {
                    let media = self.synthesize_media(&session.linked_id, &message).await;
                    self.play_interruptible(session, channel_id, media, None).await?;
                    Ok(EngineOutcome::Continue)
                }
                SilenceAction::Continue => Ok(EngineOutcome::Continue),
                SilenceAction::Goodbye { message } => {
                    let media = self.synthesize_media(&session.linked_id, &message).await;
                    self.termination_policy.finalize(self.deps.telephony.as_ref(), session, channel_id, Some(media), now_ms()).await;
                    Ok(EngineOutcome::Terminated)
                }
            };
        }

        // 6. Voice detected.
        session.mark_voice_detected();
        self.deps.marks.mark(&session.linked_id, self.offset_ms(session), MarkType::IntentFinalized, now_ms()).await.ok();

        // 7. Processing mode: STRICT for VALIDATE-kind phases, NORMAL otherwise.
        // Both transcribe; STRICT additionally enforces the deep-turn guard
        // and requires an action before proceeding (§4.5 step 7).
        let strict_mode = phase.is_some_and(|p| p.kind == PhaseKind::Validate);
        let transcript = self.transcribe(&recording_path).await.unwrap_or_default();

        if let Err(violation) = self.deep_turn_guard.check_turn(session.turn, *identity_captured, &session.current_phase) {
            warn!(call = %session.linked_id, error = %violation, "deep-turn identity guard tripped");
            session.terminate(now_ms());
            return Ok(EngineOutcome::Terminated);
        }

        if self.transfer_detector.requests_transfer(&transcript) {
            self.check_action(&session.current_phase, Action::Transfer)?;
            let queue = self.settings.transfer_queue.clone().unwrap_or_else(|| "default".to_string());
            self.deps.telephony.continue_in_dialplan(channel_id, "queues", &queue, 1).await?;
            session.terminate(now_ms());
            return Ok(EngineOutcome::Terminated);
        }

        session.add_to_history(Role::User, transcript.clone(), now_ms());
        let result = self.consult_domain(session, transcript, domain).await?;

        if strict_mode && result.action.is_none() {
            warn!(call = %session.linked_id, phase = %session.current_phase, "domain returned no action in a critical phase");
            return Err(EngineError::DomainProtocol(DomainProtocolError::MissingAction { phase: session.current_phase.clone() }));
        }

        self.apply_domain_result(session, channel_id, result, identity_captured, skip_user_input).await
    }

    async fn consult_domain(&self, session: &Session, transcript: String, domain: &dyn DomainPort) -> Result<DomainResult, EngineError> {
        let ctx = DomainContext {
            transcript,
            session_id: session.linked_id.clone(),
            caller: session.caller.clone(),
            callee: session.callee.clone(),
            bot_name: session.bot_name.clone(),
            state: session.business_state.clone(),
        };
        domain
            .process(ctx)
            .await
            .map_err(|e| EngineError::DomainProtocol(DomainProtocolError::MissingAction { phase: e.to_string() }))
    }

    async fn apply_domain_result(
        &self,
        session: &mut Session,
        channel_id: &str,
        result: DomainResult,
        identity_captured: &mut bool,
        skip_user_input: &mut bool,
    ) -> Result<EngineOutcome, EngineError> {
        if !result.shouldhangup_consistent() {
            warn!(call = %session.linked_id, "should_hangup inconsistent with action; holding phase");
            return Ok(EngineOutcome::Continue);
        }

        if let Some(updates) = &result.state {
            session.business_state = updates.clone();
        }

        let mut outcome = EngineOutcome::Continue;

        if let Some(action) = result.action.clone() {
            match action {
                DomainAction::SetState { updates } => {
                    for (k, v) in updates {
                        session.business_state.insert(k, v);
                    }
                }
                DomainAction::EndCall { text, .. } => {
                    let media = match text.as_deref() {
                        Some(text) => Some(self.synthesize_media(&session.linked_id, text).await),
                        None => None,
                    };
                    self.termination_policy.finalize(self.deps.telephony.as_ref(), session, channel_id, media, now_ms()).await;
                    return Ok(EngineOutcome::Terminated);
                }
                DomainAction::CallWebhook { name, on_success, on_error } => {
                    match self.deps.webhook.call(&name, serde_json::json!(session.business_state)).await {
                        Ok(_) => {
                            if let Some(next) = on_success {
                                PhaseManager::new(&self.phase_table).transition(session, &next, TransitionReason("webhook_success"));
                            }
                        }
                        Err(err) => {
                            warn!(call = %session.linked_id, webhook = %name, error = %err, "webhook call rejected");
                            let key = webhook_reprompt_key(&session.linked_id);
                            let _ = self.deps.store.set_px(&key, "1", Duration::from_secs(60)).await;
                            if let Some(next) = on_error {
                                PhaseManager::new(&self.phase_table).transition(session, &next, TransitionReason("webhook_error"));
                            }
                        }
                    }
                }
                DomainAction::UseEngine { variant } => {
                    outcome = EngineOutcome::SwapEngine(variant);
                }
            }
        }

        if !*identity_captured && session.business_state.contains_key("identity") {
            *identity_captured = true;
        }

        if !result.silent {
            if let Some(raw_text) = result.tts_text.as_deref() {
                // Assistant-side transfer trigger (§4.6): a transfer phrase in
                // the response triggers the same dialplan hand-off as a
                // transfer keyword in the caller's speech.
                if self.transfer_detector.requests_transfer(raw_text) {
                    self.check_action(&session.current_phase, Action::Transfer)?;
                    let media = match result.audio_file.as_deref() {
                        Some(asset) => Media::sound(asset),
                        None => self.synthesize_media(&session.linked_id, raw_text).await,
                    };
                    self.play_interruptible(session, channel_id, media, result.interrupt_policy.as_ref()).await?;
                    let queue = self.settings.transfer_queue.clone().unwrap_or_else(|| "default".to_string());
                    self.deps.telephony.continue_in_dialplan(channel_id, "queues", &queue, 1).await?;
                    session.terminate(now_ms());
                    return Ok(EngineOutcome::Terminated);
                }

                if let Some(text) = self.anti_replay.filter(session.last_spoken.as_ref(), &session.current_phase, raw_text) {
                    let media = match result.audio_file.as_deref() {
                        Some(asset) => Media::sound(asset),
                        None => self.synthesize_media(&session.linked_id, text).await,
                    };
                    self.play_interruptible(session, channel_id, media, result.interrupt_policy.as_ref()).await?;
                    session.note_spoken(text.to_string());
                    session.add_to_history(Role::Assistant, text.to_string(), now_ms());

                    // Goodbye-phrase termination (§4.5 step 9): independent of
                    // an explicit `EndCall` action. Already spoken above, so
                    // finalize only waits out the tail and hangs up.
                    if self.termination_policy.contains_goodbye(text) {
                        self.termination_policy.finalize(self.deps.telephony.as_ref(), session, channel_id, None, now_ms()).await;
                        return Ok(EngineOutcome::Terminated);
                    }
                }
            }
        }

        if result.skip_user_input {
            *skip_user_input = true;
        }

        if let Some(next_phase) = &result.next_phase {
            PhaseManager::new(&self.phase_table).transition(session, next_phase, TransitionReason("domain"));
            if let Err(violation) = self.deep_turn_guard.check_complete(&session.current_phase, *identity_captured) {
                warn!(call = %session.linked_id, error = %violation, "invalid-complete guard tripped");
                session.terminate(now_ms());
                return Ok(EngineOutcome::Terminated);
            }
        }

        Ok(outcome)
    }

    /// Synthesizes `text` and stages it as a playable asset (§4.2, §4.5 step
    /// 7). Falls back to treating `text` itself as a pre-recorded asset name
    /// if synthesis or staging fails, so a message still has a chance to
    /// play when the speech provider is unavailable.
    async fn synthesize_media(&self, linked_id: &str, text: &str) -> Media {
        match self.deps.speech.synthesize_speech(text).await {
            Ok(buffer) => match self.deps.audio_stager.stage(linked_id, &buffer).await {
                Ok(media) => media,
                Err(err) => {
                    warn!(call = linked_id, error = %err, "failed to stage synthesized audio, falling back to sound name");
                    Media::sound(text)
                }
            },
            Err(err) => {
                warn!(call = linked_id, error = %err, "speech synthesis failed, falling back to sound name");
                Media::sound(text)
            }
        }
    }

    /// Checks `action` against the lifecycle table for `phase` with no
    /// one-shot exception (§4.3). Used for every action except `Play`, which
    /// goes through [`Self::check_play_allowed`] to consult the one-shot
    /// re-prompt marker.
    fn check_action(&self, phase: &str, action: Action) -> Result<(), EngineError> {
        if self.lifecycle_allows(action, false, phase) {
            Ok(())
        } else {
            Err(EngineError::from(ContractViolation::ActionNotAllowed { phase: phase.to_string(), action: format!("{action:?}") }))
        }
    }

    /// Checks `Play` against the lifecycle table, applying the one-shot
    /// re-prompt exception (§4.3): if a webhook rejection marker is present
    /// and it is the only thing unlocking `Play` in this phase, the marker
    /// is consumed (deleted) and the play is allowed.
    async fn check_play_allowed(&self, session: &Session) -> Result<(), EngineError> {
        let phase = &session.current_phase;
        if self.lifecycle_allows(Action::Play, false, phase) {
            return Ok(());
        }
        let key = webhook_reprompt_key(&session.linked_id);
        let marker_present = self.deps.store.get(&key).await.ok().flatten().is_some();
        if marker_present && self.lifecycle_allows(Action::Play, true, phase) {
            let _ = self.deps.store.del(&key).await;
            return Ok(());
        }
        Err(EngineError::from(ContractViolation::ActionNotAllowed { phase: phase.clone(), action: format!("{:?}", Action::Play) }))
    }

    /// Plays `media`, racing the wait against a debounced
    /// `ChannelTalkingStarted` event so the caller can barge in (§4.5 step
    /// 8). Every playback is preceded by an alive-check; a gone channel
    /// skips playback without aborting the session. `interrupt_override`
    /// replaces the engine-global barge-in policy for this one play when the
    /// domain supplied a per-response `interrupt_policy` (§3).
    async fn play_interruptible(
        &self,
        session: &Session,
        channel_id: &str,
        media: Media,
        interrupt_override: Option<&InterruptPolicy>,
    ) -> Result<(), EngineError> {
        self.check_play_allowed(session).await?;

        match self.deps.telephony.is_alive(channel_id).await {
            Ok(true) => {}
            Ok(false) => {
                info!(channel = channel_id, "channel gone before playback, skipping");
                return Ok(());
            }
            Err(err) => {
                info!(channel = channel_id, error = %err, "alive-check failed before playback, skipping");
                return Ok(());
            }
        }

        let Ok(playback) = self.deps.telephony.play(PlaybackTarget::Channel(channel_id.to_string()), media).await else {
            return Ok(());
        };

        let barge_in = match interrupt_override {
            Some(policy) => BargeInGate::new(*policy, self.barge_in.debounce),
            None => self.barge_in.clone(),
        };

        let mut events = self.deps.events.lock().await;
        let mut talking_since: Option<Instant> = None;

        loop {
            tokio::select! {
                outcome = playback.wait() => {
                    if matches!(outcome, PlaybackEvent::Started) {
                        continue;
                    }
                    return Ok(());
                }
                Some(event) = events.recv() => {
                    match event {
                        TelephonyEvent::ChannelTalkingStarted { channel_id: ref c } if c.as_str() == channel_id => {
                            let since = *talking_since.get_or_insert_with(Instant::now);
                            if barge_in.should_interrupt(since.elapsed(), None) {
                                let _ = playback.stop().await;
                                let _ = self.deps.speech.cancel_current_response("barge_in").await;
                                return Ok(());
                            }
                        }
                        TelephonyEvent::ChannelTalkingFinished { channel_id: ref c } if c.as_str() == channel_id => {
                            talking_since = None;
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Reads the just-finished recording and transcribes it via the speech
    /// adapter (§4.2 `transcribeAudioOnly`).
    async fn transcribe(&self, path: &Option<String>) -> Option<String> {
        let path = path.as_ref()?;
        let bytes = tokio::fs::read(path).await.ok()?;
        self.deps.speech.transcribe_audio_only(vec![AudioFrame(bytes)]).await.ok()
    }

    /// Polls briefly for the recording file to materialize, then validates
    /// its size against the configured minimum (§4.5 step 4).
    async fn recording_qualifies(&self, path: &Option<String>) -> bool {
        let Some(path) = path else { return false };
        for _ in 0..5 {
            if let Ok(meta) = tokio::fs::metadata(path).await {
                return meta.len() >= self.settings.effective_min_recording_bytes();
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    fn offset_ms(&self, session: &Session) -> u64 {
        (now_ms() - session.start_ts_ms).max(0) as u64
    }

    #[must_use]
    pub fn lifecycle_allows(&self, action: Action, one_shot_reprompt: bool, phase: &str) -> bool {
        self.lifecycle.is_action_allowed(phase, action, one_shot_reprompt)
    }

    /// Subscribed-to event kinds the composition root should pass to
    /// [`TelephonyPort::subscribe`] when building [`TurnOrchestratorDeps::events`].
    #[must_use]
    pub fn required_event_kinds() -> Vec<EventKind> {
        vec![EventKind::ChannelTalkingStarted, EventKind::ChannelTalkingFinished]
    }
}

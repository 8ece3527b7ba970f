//! `Playback` handle (§4.1): waits on a dedicated per-playback event
//! subscription rather than the caller's own subscription, so playback
//! bookkeeping never competes with the orchestrator's barge-in stream.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::warn;

use async_trait::async_trait;
use voicebot_core::ports::{EventKind, Playback, PlaybackEvent, TelephonyError, TelephonyEvent};

use crate::events::EventBus;
use crate::rest::RestClient;

const PLAYBACK_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RestPlayback {
    rest: std::sync::Arc<RestClient>,
    playback_id: String,
    events: Mutex<tokio::sync::mpsc::Receiver<TelephonyEvent>>,
    started_synthesized: std::sync::atomic::AtomicBool,
}

impl RestPlayback {
    /// Subscribes before returning so no `PlaybackStarted`/`Finished` event
    /// emitted between the REST call and the first `wait()` is missed.
    #[must_use]
    pub fn new(rest: std::sync::Arc<RestClient>, bus: &EventBus, playback_id: String) -> Self {
        let events = bus.subscribe(&[EventKind::Playback]);
        Self {
            rest,
            playback_id,
            events: Mutex::new(events),
            started_synthesized: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Playback for RestPlayback {
    async fn stop(&self) -> Result<(), TelephonyError> {
        self.rest.stop_playback(&self.playback_id).await.map_err(Into::into)
    }

    async fn wait(&self) -> PlaybackEvent {
        use std::sync::atomic::Ordering;
        if self
            .started_synthesized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // The REST call already returned this id successfully; the
            // switch sometimes drops the `PlaybackStarted` event under
            // load, so the first `wait()` always reports `Started`
            // without consuming from the event stream.
            return PlaybackEvent::Started;
        }

        let mut events = self.events.lock().await;
        let result = timeout(PLAYBACK_TIMEOUT, async {
            loop {
                match events.recv().await {
                    Some(TelephonyEvent::PlaybackStarted { playback_id }) if playback_id == self.playback_id => {
                        return PlaybackEvent::Started;
                    }
                    Some(TelephonyEvent::PlaybackFinished { playback_id }) if playback_id == self.playback_id => {
                        return PlaybackEvent::Finished;
                    }
                    Some(TelephonyEvent::PlaybackStopped { playback_id }) if playback_id == self.playback_id => {
                        return PlaybackEvent::Stopped;
                    }
                    Some(TelephonyEvent::PlaybackFailed { playback_id }) if playback_id == self.playback_id => {
                        return PlaybackEvent::Failed;
                    }
                    Some(_) => continue,
                    None => return PlaybackEvent::Failed,
                }
            }
        })
        .await;

        match result {
            Ok(event) => event,
            Err(_) => {
                warn!(playback_id = %self.playback_id, "playback timed out after 30s, forcing stop");
                let _ = self.stop().await;
                PlaybackEvent::Failed
            }
        }
    }
}

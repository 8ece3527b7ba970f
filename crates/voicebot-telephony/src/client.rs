//! [`TelephonyPort`] implementation: composes [`RestClient`] and
//! [`EventBus`] into the single facade the engine depends on (C1, §4.1).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use voicebot_core::ports::{
    BridgeType, EventKind, Media, Playback, PlaybackTarget, RecordOptions, Recording, SnoopSpec, TelephonyError,
    TelephonyEvent, TelephonyPort,
};

use crate::events::EventBus;
use crate::playback::RestPlayback;
use crate::probe;
use crate::rest::{target_path, RestClient};

/// Composition-root entry point: connects the REST client and the event
/// socket, then exposes both through the `TelephonyPort` trait object.
pub struct AriTelephonyClient {
    rest: Arc<RestClient>,
    events: EventBus,
}

impl AriTelephonyClient {
    /// `rest_base_url` and `ws_url` point at the same switch instance;
    /// `app` is the Stasis application name both surfaces are scoped to.
    pub async fn connect(rest_base_url: Url, ws_url: Url, app: impl Into<String>) -> Result<Self, TelephonyError> {
        let app = app.into();
        let events = EventBus::connect(ws_url, &app).await.map_err(TelephonyError::from)?;
        let rest = Arc::new(RestClient::new(rest_base_url, app));
        Ok(Self { rest, events })
    }

    /// Shared handle to the REST client, for callers (e.g. the recording
    /// segmenter adapter) that need the same connection pool.
    #[must_use]
    pub fn rest_client(&self) -> Arc<RestClient> {
        Arc::clone(&self.rest)
    }
}

#[async_trait]
impl TelephonyPort for AriTelephonyClient {
    async fn is_alive(&self, channel_id: &str) -> Result<bool, TelephonyError> {
        match self.rest.channel_state(channel_id).await {
            Ok(_) => Ok(true),
            Err(crate::error::TransportError::NotFound(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn hangup(&self, channel_id: &str) -> Result<(), TelephonyError> {
        self.rest.hangup(channel_id).await.map_err(Into::into)
    }

    async fn continue_in_dialplan(
        &self,
        channel_id: &str,
        context: &str,
        extension: &str,
        priority: u32,
    ) -> Result<(), TelephonyError> {
        self.rest.continue_in_dialplan(channel_id, context, extension, priority).await.map_err(Into::into)
    }

    async fn play(&self, target: PlaybackTarget, media: Media) -> Result<Box<dyn Playback>, TelephonyError> {
        let path = target_path(&target);
        let playback_id = self.rest.start_playback(&path, &media).await?;
        Ok(Box::new(RestPlayback::new(Arc::clone(&self.rest), &self.events, playback_id)))
    }

    async fn record(&self, channel_id: &str, opts: RecordOptions) -> Result<Recording, TelephonyError> {
        self.rest.start_recording(channel_id, &opts).await.map_err(Into::into)
    }

    async fn create_bridge(&self, bridge_type: BridgeType) -> Result<String, TelephonyError> {
        self.rest.create_bridge(bridge_type).await.map_err(Into::into)
    }

    async fn add_channel_to_bridge(&self, bridge_id: &str, channel_id: &str) -> Result<(), TelephonyError> {
        self.rest.add_channel_to_bridge(bridge_id, channel_id).await.map_err(Into::into)
    }

    async fn create_snoop(&self, parent_channel_id: &str, spec: SnoopSpec) -> Result<String, TelephonyError> {
        self.rest.create_snoop(parent_channel_id, &spec).await.map_err(Into::into)
    }

    async fn start_moh(&self, channel_id: &str, music_class: &str) -> Result<(), TelephonyError> {
        self.rest.start_moh(channel_id, music_class).await.map_err(Into::into)
    }

    async fn stop_moh(&self, channel_id: &str) -> Result<(), TelephonyError> {
        self.rest.stop_moh(channel_id).await.map_err(Into::into)
    }

    async fn subscribe(&self, kinds: &[EventKind]) -> Result<tokio::sync::mpsc::Receiver<TelephonyEvent>, TelephonyError> {
        Ok(self.events.subscribe(kinds))
    }

    async fn wait_for_audio_plane_ready(&self, channel_id: &str, timeout: Duration) -> bool {
        probe::wait_for_audio_plane_ready(&self.rest, channel_id, timeout).await
    }

    async fn pin_snoop_to_bridge(&self, bridge_id: &str, channel_id: &str, max_retries: u32) -> Result<(), TelephonyError> {
        probe::pin_snoop_to_bridge(&self.rest, bridge_id, channel_id, max_retries).await
    }
}

//! WebSocket event stream (§4.1, §6): a single background task reads the
//! switch's event socket and fans events out to every `subscribe` caller.
//!
//! Mirrors the "typed events over channels, not closures" redesign flag
//! (§9): the orchestrator never registers a callback here, it only ever
//! receives a `mpsc::Receiver<TelephonyEvent>`.

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use voicebot_core::ports::{EventKind, TelephonyEvent};

const FANOUT_CAPACITY: usize = 256;
const SUBSCRIBER_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireEvent {
    StasisStart { channel: WireChannel },
    StasisEnd { channel: WireChannel },
    ChannelTalkingStarted { channel: WireChannel },
    ChannelTalkingFinished { channel: WireChannel },
    PlaybackStarted { playback: WireId },
    PlaybackFinished { playback: WireId },
    PlaybackStopped { playback: WireId },
    PlaybackFailed { playback: WireId },
    RecordingFinished { recording: WireName },
    RecordingFailed { recording: WireName },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(rename = "linkedid", default)]
    linked_id: String,
}

#[derive(Debug, Deserialize)]
struct WireId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireName {
    name: String,
}

fn into_domain_event(wire: WireEvent) -> Option<TelephonyEvent> {
    match wire {
        WireEvent::StasisStart { channel } => Some(TelephonyEvent::StasisStart {
            channel_id: channel.id,
            linked_id: channel.linked_id,
        }),
        WireEvent::StasisEnd { channel } => Some(TelephonyEvent::StasisEnd {
            channel_id: channel.id,
            linked_id: channel.linked_id,
        }),
        WireEvent::ChannelTalkingStarted { channel } => {
            Some(TelephonyEvent::ChannelTalkingStarted { channel_id: channel.id })
        }
        WireEvent::ChannelTalkingFinished { channel } => {
            Some(TelephonyEvent::ChannelTalkingFinished { channel_id: channel.id })
        }
        WireEvent::PlaybackStarted { playback } => Some(TelephonyEvent::PlaybackStarted { playback_id: playback.id }),
        WireEvent::PlaybackFinished { playback } => {
            Some(TelephonyEvent::PlaybackFinished { playback_id: playback.id })
        }
        WireEvent::PlaybackStopped { playback } => {
            Some(TelephonyEvent::PlaybackStopped { playback_id: playback.id })
        }
        WireEvent::PlaybackFailed { playback } => Some(TelephonyEvent::PlaybackFailed { playback_id: playback.id }),
        WireEvent::RecordingFinished { recording } => {
            Some(TelephonyEvent::RecordingFinished { name: recording.name })
        }
        WireEvent::RecordingFailed { recording } => Some(TelephonyEvent::RecordingFailed { name: recording.name }),
        WireEvent::Unknown => None,
    }
}

fn kind_of(event: &TelephonyEvent) -> EventKind {
    match event {
        TelephonyEvent::StasisStart { .. } => EventKind::StasisStart,
        TelephonyEvent::StasisEnd { .. } => EventKind::StasisEnd,
        TelephonyEvent::ChannelTalkingStarted { .. } => EventKind::ChannelTalkingStarted,
        TelephonyEvent::ChannelTalkingFinished { .. } => EventKind::ChannelTalkingFinished,
        TelephonyEvent::PlaybackStarted { .. }
        | TelephonyEvent::PlaybackFinished { .. }
        | TelephonyEvent::PlaybackStopped { .. }
        | TelephonyEvent::PlaybackFailed { .. } => EventKind::Playback,
        TelephonyEvent::RecordingFinished { .. } | TelephonyEvent::RecordingFailed { .. } => EventKind::Recording,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_stasis_start_maps_to_domain_event_with_linked_id() {
        let wire = WireEvent::StasisStart {
            channel: WireChannel { id: "ch-1".into(), linked_id: "link-1".into() },
        };
        let event = into_domain_event(wire).unwrap();
        assert!(matches!(
            event,
            TelephonyEvent::StasisStart { channel_id, linked_id }
                if channel_id == "ch-1" && linked_id == "link-1"
        ));
    }

    #[test]
    fn unknown_wire_event_is_dropped() {
        let json = r#"{"type": "SomethingElseEntirely"}"#;
        let wire: WireEvent = serde_json::from_str(json).unwrap();
        assert!(into_domain_event(wire).is_none());
    }

    #[test]
    fn playback_variants_all_map_to_the_playback_kind() {
        let event = TelephonyEvent::PlaybackStopped { playback_id: "pb-1".into() };
        assert_eq!(kind_of(&event), EventKind::Playback);
    }
}

/// Owns the background WS-reader task and hands out filtered subscriptions.
pub struct EventBus {
    tx: broadcast::Sender<TelephonyEvent>,
}

impl EventBus {
    /// Connects to the event socket and spawns the reader task.
    pub async fn connect(ws_url: Url, app: &str) -> crate::error::TransportResult<Self> {
        let mut connect_url = ws_url;
        connect_url.query_pairs_mut().append_pair("app", app).append_pair("subscribeAll", "true");

        let (stream, _response) = tokio_tungstenite::connect_async(connect_url.as_str()).await?;
        let (tx, _rx) = broadcast::channel(FANOUT_CAPACITY);
        let task_tx = tx.clone();

        tokio::spawn(async move {
            let (_write, mut read) = stream.split();
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<WireEvent>(&text) {
                            Ok(wire) => {
                                if let Some(event) = into_domain_event(wire) {
                                    let _ = task_tx.send(event);
                                }
                            }
                            Err(err) => debug!(error = %err, "unrecognized control-interface event payload"),
                        }
                    }
                    Ok(Message::Close(_)) => {
                        warn!("control-interface event socket closed by peer");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "control-interface event socket read error");
                        break;
                    }
                }
            }
        });

        Ok(Self { tx })
    }

    /// Hands out an `mpsc::Receiver` filtered to `kinds`, fed by a small
    /// forwarding task off the shared broadcast channel. Each call is an
    /// independent subscription; closing the returned receiver just drops
    /// that forwarder.
    pub fn subscribe(&self, kinds: &[EventKind]) -> mpsc::Receiver<TelephonyEvent> {
        let mut broadcast_rx = self.tx.subscribe();
        let kinds = kinds.to_vec();
        let (fwd_tx, fwd_rx) = mpsc::channel(SUBSCRIBER_CAPACITY);

        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(event) => {
                        if kinds.contains(&kind_of(&event)) && fwd_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "telephony event subscriber lagged, dropping events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        fwd_rx
    }
}

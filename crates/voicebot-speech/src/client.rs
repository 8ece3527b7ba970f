//! [`SpeechPort`] implementation over a single long-lived WebSocket session
//! to the speech provider (C2, §4.2, §6).
//!
//! At most one response is in flight per session (§5), so the reader task
//! routes every server event into a single `Mutex<Option<PendingResponse>>`
//! slot rather than a request-id keyed map.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use voicebot_core::ports::{AudioBuffer, AudioFrame, SpeechError, SpeechPort, SpeechSessionConfig};

use crate::error::{SessionError, SessionResult};
use crate::protocol::{ClientEvent, ConversationItem, ContentPart, ResponseOptions, ServerEvent, SessionPayload};

type WsWrite = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Response,
    TranscriptionOnly,
}

struct PendingResponse {
    kind: PendingKind,
    audio: Vec<u8>,
    transcript: String,
    completion: oneshot::Sender<SessionResult<Outcome>>,
}

enum Outcome {
    Audio(AudioBuffer),
    Transcript(String),
}

struct SharedState {
    in_flight: AtomicBool,
    incremental: AtomicBool,
    pending: Mutex<Option<PendingResponse>>,
}

pub struct RealtimeSpeechClient {
    write: Mutex<Option<WsWrite>>,
    state: Arc<SharedState>,
    ws_url: Url,
}

impl RealtimeSpeechClient {
    #[must_use]
    pub fn new(ws_url: Url) -> Self {
        Self {
            write: Mutex::new(None),
            state: Arc::new(SharedState {
                in_flight: AtomicBool::new(false),
                incremental: AtomicBool::new(false),
                pending: Mutex::new(None),
            }),
            ws_url,
        }
    }

    async fn send(&self, event: &ClientEvent) -> SessionResult<()> {
        let json = serde_json::to_string(event)?;
        let mut guard = self.write.lock().await;
        let sink = guard.as_mut().ok_or(SessionError::NotConnected)?;
        sink.send(Message::Text(json)).await?;
        Ok(())
    }

    async fn append_and_commit(&self, frames: Vec<AudioFrame>) -> SessionResult<()> {
        for frame in frames {
            let audio = BASE64.encode(&frame.0);
            self.send(&ClientEvent::InputAudioBufferAppend { audio }).await?;
        }
        self.send(&ClientEvent::InputAudioBufferCommit).await
    }

    async fn await_response(&self, kind: PendingKind) -> SessionResult<Outcome> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.state.pending.lock().await;
            *pending = Some(PendingResponse { kind, audio: Vec::new(), transcript: String::new(), completion: tx });
        }
        rx.await.unwrap_or(Err(SessionError::Closed))
    }

    fn spawn_reader(
        state: Arc<SharedState>,
        mut read: futures_util::stream::SplitStream<
            tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        >,
    ) {
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => {
                        Self::fail_pending(&state, SessionError::Closed).await;
                        break;
                    }
                    Ok(_) => continue,
                    Err(err) => {
                        warn!(error = %err, "speech session socket read error");
                        Self::fail_pending(&state, SessionError::WebSocket(err)).await;
                        break;
                    }
                };

                let event: ServerEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        debug!(error = %err, "unrecognized speech provider event payload");
                        continue;
                    }
                };

                Self::route(&state, event).await;
            }
        });
    }

    async fn route(state: &Arc<SharedState>, event: ServerEvent) {
        match event {
            ServerEvent::ResponseAudioDelta { delta } | ServerEvent::ResponseAudioTranscriptDelta { delta } => {
                let mut pending = state.pending.lock().await;
                if let Some(p) = pending.as_mut() {
                    if matches!(p.kind, PendingKind::Response) {
                        if let Ok(bytes) = BASE64.decode(delta.as_bytes()) {
                            p.audio.extend_from_slice(&bytes);
                        }
                    }
                }
            }
            ServerEvent::InputAudioTranscriptionDelta { delta } => {
                if !state.incremental.load(Ordering::Relaxed) {
                    return;
                }
                let mut pending = state.pending.lock().await;
                if let Some(p) = pending.as_mut() {
                    if matches!(p.kind, PendingKind::TranscriptionOnly) {
                        p.transcript.push_str(&delta);
                    }
                }
            }
            ServerEvent::InputAudioTranscriptionCompleted { transcript } => {
                let mut pending = state.pending.lock().await;
                if let Some(p) = &pending {
                    if matches!(p.kind, PendingKind::TranscriptionOnly) {
                        let p = pending.take().unwrap();
                        let _ = p.completion.send(Ok(Outcome::Transcript(transcript)));
                    }
                }
            }
            ServerEvent::ResponseCreated { .. } => {
                state.in_flight.store(true, Ordering::SeqCst);
            }
            ServerEvent::ResponseDone { .. } => {
                state.in_flight.store(false, Ordering::SeqCst);
                let mut pending = state.pending.lock().await;
                if let Some(p) = &pending {
                    if matches!(p.kind, PendingKind::Response) {
                        let p = pending.take().unwrap();
                        let _ = p.completion.send(Ok(Outcome::Audio(AudioBuffer(p.audio))));
                    }
                }
            }
            ServerEvent::Error { error } => {
                state.in_flight.store(false, Ordering::SeqCst);
                Self::fail_pending(state, SessionError::Provider(error.message)).await;
            }
            ServerEvent::SessionCreated
            | ServerEvent::SessionUpdated
            | ServerEvent::ResponseAudioTranscriptDone { .. }
            | ServerEvent::Unrecognized => {}
        }
    }

    async fn fail_pending(state: &Arc<SharedState>, err: SessionError) {
        let mut pending = state.pending.lock().await;
        if let Some(p) = pending.take() {
            let _ = p.completion.send(Err(SessionError::Provider(err.to_string())));
        }
    }
}

#[async_trait]
impl SpeechPort for RealtimeSpeechClient {
    async fn connect(&self, config: SpeechSessionConfig) -> Result<(), SpeechError> {
        let (stream, _response) = tokio_tungstenite::connect_async(self.ws_url.as_str())
            .await
            .map_err(SessionError::from)
            .map_err(SpeechError::from)?;
        let (write, read) = stream.split();
        *self.write.lock().await = Some(write);
        Self::spawn_reader(Arc::clone(&self.state), read);
        self.send(&ClientEvent::SessionUpdate { session: SessionPayload::from_config(&config) })
            .await
            .map_err(SpeechError::from)
    }

    async fn send_audio_and_wait(&self, frames: Vec<AudioFrame>) -> Result<AudioBuffer, SpeechError> {
        self.append_and_commit(frames).await.map_err(SpeechError::from)?;
        self.send(&ClientEvent::ResponseCreate { response: ResponseOptions::default() })
            .await
            .map_err(SpeechError::from)?;
        match self.await_response(PendingKind::Response).await.map_err(SpeechError::from)? {
            Outcome::Audio(buf) => Ok(buf),
            Outcome::Transcript(_) => Err(SpeechError::Provider("expected audio response, got transcript".into())),
        }
    }

    async fn transcribe_audio_only(&self, frames: Vec<AudioFrame>) -> Result<String, SpeechError> {
        self.append_and_commit(frames).await.map_err(SpeechError::from)?;
        match self.await_response(PendingKind::TranscriptionOnly).await.map_err(SpeechError::from)? {
            Outcome::Transcript(text) => Ok(text),
            Outcome::Audio(_) => Err(SpeechError::Provider("expected transcript, got audio response".into())),
        }
    }

    async fn synthesize_speech(&self, text: &str) -> Result<AudioBuffer, SpeechError> {
        self.send(&ClientEvent::ConversationItemCreate {
            item: ConversationItem::Message {
                role: "assistant",
                content: vec![ContentPart::InputText { text: text.to_string() }],
            },
        })
        .await
        .map_err(SpeechError::from)?;
        self.send(&ClientEvent::ResponseCreate { response: ResponseOptions::default() })
            .await
            .map_err(SpeechError::from)?;
        match self.await_response(PendingKind::Response).await.map_err(SpeechError::from)? {
            Outcome::Audio(buf) => Ok(buf),
            Outcome::Transcript(_) => Err(SpeechError::Provider("expected audio response, got transcript".into())),
        }
    }

    async fn send_system_text(&self, text: &str) -> Result<AudioBuffer, SpeechError> {
        self.send(&ClientEvent::ConversationItemCreate {
            item: ConversationItem::Message {
                role: "system",
                content: vec![ContentPart::InputText { text: text.to_string() }],
            },
        })
        .await
        .map_err(SpeechError::from)?;
        self.send(&ClientEvent::ResponseCreate { response: ResponseOptions::default() })
            .await
            .map_err(SpeechError::from)?;
        match self.await_response(PendingKind::Response).await.map_err(SpeechError::from)? {
            Outcome::Audio(buf) => Ok(buf),
            Outcome::Transcript(_) => Err(SpeechError::Provider("expected audio response, got transcript".into())),
        }
    }

    async fn cancel_current_response(&self, reason: &str) -> Result<(), SpeechError> {
        if !self.state.in_flight.load(Ordering::SeqCst) {
            return Ok(());
        }
        debug!(reason, "cancelling in-flight speech response");
        self.send(&ClientEvent::ResponseCancel).await.map_err(SpeechError::from)?;
        self.state.in_flight.store(false, Ordering::SeqCst);
        let mut pending = self.state.pending.lock().await;
        if let Some(p) = pending.take() {
            let _ = p.completion.send(Err(SessionError::Cancelled));
        }
        Ok(())
    }

    async fn set_incremental(&self, on: bool) -> Result<(), SpeechError> {
        self.state.incremental.store(on, Ordering::Relaxed);
        Ok(())
    }

    async fn has_in_flight_response(&self) -> bool {
        self.state.in_flight.load(Ordering::SeqCst)
    }
}

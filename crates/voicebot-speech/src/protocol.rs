//! Wire shapes for the speech provider's session protocol (§4.2, §6):
//! `session.update`, `input_audio_buffer.append/commit`,
//! `response.create/cancel`, `conversation.item.create` client-side;
//! `session.created/updated`, transcription deltas, response deltas and
//! `response.done`/`error` server-side.

use serde::{Deserialize, Serialize};

use voicebot_core::ports::{AudioFormat, SpeechSessionConfig};

fn format_str(format: AudioFormat) -> &'static str {
    match format {
        AudioFormat::MuLaw8k => "g711_ulaw",
        AudioFormat::Pcm16_24k => "pcm16",
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionPayload },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseOptions },
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

#[derive(Debug, Serialize)]
pub struct SessionPayload {
    pub voice: String,
    pub instructions: String,
    pub model: String,
    pub language: String,
    pub input_audio_format: &'static str,
    pub output_audio_format: &'static str,
    pub input_audio_transcription: TranscriptionPayload,
}

#[derive(Debug, Serialize)]
pub struct TranscriptionPayload {
    pub model: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ConversationItem {
    #[serde(rename = "message")]
    Message { role: &'static str, content: Vec<ContentPart> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "input_text")]
    InputText { text: String },
}

#[derive(Debug, Default, Serialize)]
pub struct ResponseOptions {
    /// When set, only text modality (used for "request transcript only"
    /// turns so the provider never synthesizes audio it will be thrown
    /// away — §4.2 `transcribe_audio_only`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<&'static str>>,
}

impl SessionPayload {
    #[must_use]
    pub fn from_config(config: &SpeechSessionConfig) -> Self {
        Self {
            voice: config.voice.clone(),
            instructions: config.instructions.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
            input_audio_format: format_str(config.input_format),
            output_audio_format: format_str(config.output_format),
            input_audio_transcription: TranscriptionPayload { model: config.transcription_model.clone() },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "session.updated")]
    SessionUpdated,
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputAudioTranscriptionDelta { delta: String },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted { transcript: String },
    #[serde(rename = "response.created")]
    ResponseCreated { response: ResponseHeader },
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta { delta: String },
    #[serde(rename = "response.audio_transcript.delta")]
    ResponseAudioTranscriptDelta { delta: String },
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone { transcript: String },
    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseHeader },
    #[serde(rename = "error")]
    Error { error: ProviderErrorPayload },
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Deserialize)]
pub struct ResponseHeader {
    pub id: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ProviderErrorPayload {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_update_serializes_with_tagged_type() {
        let config = SpeechSessionConfig {
            voice: "alloy".into(),
            language: "es".into(),
            model: "gpt-realtime".into(),
            instructions: "eres un asistente".into(),
            transcription_model: "whisper-1".into(),
            input_format: AudioFormat::MuLaw8k,
            output_format: AudioFormat::Pcm16_24k,
        };
        let event = ClientEvent::SessionUpdate { session: SessionPayload::from_config(&config) };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session.update");
        assert_eq!(json["session"]["input_audio_format"], "g711_ulaw");
        assert_eq!(json["session"]["output_audio_format"], "pcm16");
    }

    #[test]
    fn response_done_deserializes_from_wire_shape() {
        let json = r#"{"type": "response.done", "response": {"id": "resp_1", "status": "completed"}}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::ResponseDone { response } if response.id == "resp_1"));
    }

    #[test]
    fn unknown_event_type_does_not_fail_deserialization() {
        let json = r#"{"type": "some.future.event"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::Unrecognized));
    }
}

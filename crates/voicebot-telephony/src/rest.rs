//! REST surface of the control-interface client: channel, bridge, recording
//! and snoop operations (§4.1, §6). The WebSocket event stream lives in
//! [`crate::events`]; this module never touches it.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use crate::error::{TransportError, TransportResult};
use voicebot_core::ports::{BridgeType, Media, Recording, RecordOptions, SnoopSpec};

#[derive(Debug, Deserialize)]
struct ChannelState {
    state: String,
}

#[derive(Debug, Deserialize)]
struct CreatedWithId {
    id: String,
}

/// Thin REST client over the switch's control interface. Holds a base URL
/// and a pooled `reqwest::Client`; every call maps non-2xx statuses through
/// [`TransportError`] the same way `gglib-hf`'s backend does.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    app: String,
}

impl RestClient {
    #[must_use]
    pub fn new(base_url: Url, app: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build control-interface HTTP client");
        Self { http, base_url, app: app.into() }
    }

    fn url(&self, path: &str) -> TransportResult<Url> {
        self.base_url.join(path).map_err(TransportError::from)
    }

    async fn check_status(resp: reqwest::Response, path: &str) -> TransportResult<reqwest::Response> {
        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(TransportError::NotFound(path.to_string()));
        }
        if status.as_u16() == 409 || status.as_u16() == 400 {
            return Err(TransportError::Conflict(path.to_string()));
        }
        if !status.is_success() {
            return Err(TransportError::RequestFailed { status: status.as_u16(), path: path.to_string() });
        }
        Ok(resp)
    }

    pub async fn channel_state(&self, channel_id: &str) -> TransportResult<String> {
        let path = format!("channels/{channel_id}");
        let url = self.url(&path)?;
        let resp = self.http.get(url).send().await?;
        let resp = Self::check_status(resp, &path).await?;
        let body: ChannelState = resp.json().await?;
        Ok(body.state)
    }

    pub async fn hangup(&self, channel_id: &str) -> TransportResult<()> {
        let path = format!("channels/{channel_id}");
        let url = self.url(&path)?;
        let resp = self.http.delete(url).send().await?;
        Self::check_status(resp, &path).await?;
        Ok(())
    }

    pub async fn continue_in_dialplan(
        &self,
        channel_id: &str,
        context: &str,
        extension: &str,
        priority: u32,
    ) -> TransportResult<()> {
        let path = format!("channels/{channel_id}/continue");
        let url = self.url(&path)?;
        let body = json!({ "context": context, "extension": extension, "priority": priority });
        let resp = self.http.post(url).json(&body).send().await?;
        Self::check_status(resp, &path).await?;
        Ok(())
    }

    pub async fn set_channel_var(&self, channel_id: &str, variable: &str, value: &str) -> TransportResult<()> {
        let path = format!("channels/{channel_id}/variable");
        let url = self.url(&path)?;
        let body = json!({ "variable": variable, "value": value });
        let resp = self.http.post(url).json(&body).send().await?;
        Self::check_status(resp, &path).await?;
        Ok(())
    }

    pub async fn start_playback(&self, target_path: &str, media: &Media) -> TransportResult<String> {
        let path = format!("{target_path}/play");
        let url = self.url(&path)?;
        let body = json!({ "media": media.uri, "app": self.app });
        let resp = self.http.post(url).json(&body).send().await?;
        let resp = Self::check_status(resp, &path).await?;
        let body: CreatedWithId = resp.json().await?;
        Ok(body.id)
    }

    pub async fn stop_playback(&self, playback_id: &str) -> TransportResult<()> {
        let path = format!("playbacks/{playback_id}");
        let url = self.url(&path)?;
        let resp = self.http.delete(url).send().await?;
        Self::check_status(resp, &path).await?;
        Ok(())
    }

    pub async fn start_recording(&self, channel_id: &str, opts: &RecordOptions) -> TransportResult<Recording> {
        let path = format!("channels/{channel_id}/record");
        let url = self.url(&path)?;
        let name = format!("rec-{channel_id}-{}", uuid::Uuid::new_v4());
        let body = json!({
            "name": name,
            "format": opts.format,
            "maxDurationSeconds": opts.max_duration_ms / 1000,
            "maxSilenceSeconds": opts.max_silence_ms / 1000,
            "beep": opts.beep,
            "ifExists": "overwrite",
        });
        let resp = self.http.post(url).json(&body).send().await?;
        Self::check_status(resp, &path).await?;
        Ok(Recording { name: name.clone(), path: format!("/var/spool/recordings/{name}.{}", opts.format) })
    }

    pub async fn stop_recording(&self, name: &str) -> TransportResult<()> {
        let path = format!("recordings/live/{name}/stop");
        let url = self.url(&path)?;
        let resp = self.http.post(url).send().await?;
        Self::check_status(resp, &path).await?;
        Ok(())
    }

    pub async fn create_bridge(&self, bridge_type: BridgeType) -> TransportResult<String> {
        let kind = match bridge_type {
            BridgeType::Mixing => "mixing",
        };
        let path = "bridges".to_string();
        let url = self.url(&path)?;
        let body = json!({ "type": kind });
        let resp = self.http.post(url).json(&body).send().await?;
        let resp = Self::check_status(resp, &path).await?;
        let body: CreatedWithId = resp.json().await?;
        Ok(body.id)
    }

    pub async fn add_channel_to_bridge(&self, bridge_id: &str, channel_id: &str) -> TransportResult<()> {
        let path = format!("bridges/{bridge_id}/addChannel");
        let url = self.url(&path)?;
        let body = json!({ "channel": channel_id });
        let resp = self.http.post(url).json(&body).send().await?;
        Self::check_status(resp, &path).await?;
        Ok(())
    }

    pub async fn create_snoop(&self, parent_channel_id: &str, spec: &SnoopSpec) -> TransportResult<String> {
        let path = format!("channels/{parent_channel_id}/snoopChannel");
        let url = self.url(&path)?;
        let body = json!({ "spy": spec.spy, "whisper": spec.whisper, "app": spec.app });
        let resp = self.http.post(url).json(&body).send().await?;
        let resp = Self::check_status(resp, &path).await?;
        let body: CreatedWithId = resp.json().await?;
        Ok(body.id)
    }

    pub async fn start_moh(&self, channel_id: &str, music_class: &str) -> TransportResult<()> {
        let path = format!("channels/{channel_id}/moh");
        let url = self.url(&path)?;
        let body = json!({ "mohClass": music_class });
        let resp = self.http.post(url).json(&body).send().await?;
        Self::check_status(resp, &path).await?;
        Ok(())
    }

    pub async fn stop_moh(&self, channel_id: &str) -> TransportResult<()> {
        let path = format!("channels/{channel_id}/moh");
        let url = self.url(&path)?;
        let resp = self.http.delete(url).send().await?;
        Self::check_status(resp, &path).await?;
        Ok(())
    }
}

/// Playback/bridge path fragments share the same `/play` suffix; this just
/// spells out which prefix a [`voicebot_core::ports::PlaybackTarget`] maps to.
#[must_use]
pub fn target_path(target: &voicebot_core::ports::PlaybackTarget) -> String {
    match target {
        voicebot_core::ports::PlaybackTarget::Channel(id) => format!("channels/{id}"),
        voicebot_core::ports::PlaybackTarget::Bridge(id) => format!("bridges/{id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicebot_core::ports::PlaybackTarget;

    #[test]
    fn target_path_distinguishes_channel_from_bridge() {
        assert_eq!(target_path(&PlaybackTarget::Channel("ch-1".into())), "channels/ch-1");
        assert_eq!(target_path(&PlaybackTarget::Bridge("br-1".into())), "bridges/br-1");
    }

    #[test]
    fn client_joins_relative_paths_against_the_base_url() {
        let client = RestClient::new(Url::parse("http://127.0.0.1:8088/ari/").unwrap(), "voicebot");
        let url = client.url("channels/abc123").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8088/ari/channels/abc123");
    }
}

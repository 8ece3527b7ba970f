//! [`WebhookPort`] implementation: a flat name-to-endpoint registry plus a
//! pooled `reqwest::Client`, the same REST-client shape as the HuggingFace
//! Hub client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use voicebot_core::ports::{WebhookError, WebhookPort};

use crate::error::ClientError;

pub struct WebhookClient {
    http: reqwest::Client,
    endpoints: HashMap<String, Url>,
}

impl WebhookClient {
    #[must_use]
    pub fn new(endpoints: HashMap<String, Url>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build webhook HTTP client");
        Self { http, endpoints }
    }
}

#[async_trait]
impl WebhookPort for WebhookClient {
    async fn call(&self, name: &str, payload: Value) -> Result<Value, WebhookError> {
        let url = self.endpoints.get(name).cloned().ok_or_else(|| ClientError::UnknownWebhook(name.to_string()))?;

        let resp = self.http.post(url).json(&payload).send().await.map_err(ClientError::from)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::RequestFailed { name: name.to_string(), status: status.as_u16() }.into());
        }

        resp.json::<Value>().await.map_err(|e| ClientError::from(e).into())
    }
}

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::ChatMessage;
use std::sync::LazyLock;
use std::time::Duration;

use crate::ChatBackend;

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(300))
        .pool_max_idle_per_host(2)
        .build()
        .unwrap_or_else(|_| Client::new())
});

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

pub struct OllamaClient {
    http: Client,
    base: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            base: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Names of the models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base);
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("ollama error: {}", resp.status()));
        }
        let body: OllamaTagsResponse = resp.json().await?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait::async_trait]
impl ChatBackend for OllamaClient {
    async fn generate(&self, model: &str, messages: Vec<ChatMessage>) -> Result<String> {
        let url = format!("{}/api/chat", self.base);
        let req = OllamaChatRequest {
            model,
            messages: &messages,
            stream: false,
        };
        tracing::debug!(model, messages = messages.len(), "ollama chat request");
        let resp = self.http.post(url).json(&req).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("ollama error: {}", resp.status()));
        }
        let body: OllamaChatResponse = resp.json().await?;
        Ok(body.message.map(|m| m.content).unwrap_or_default())
    }
}

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::{build_backend_url, Backend, BackendCallOutcome};
use crate::protocol::{BackendChatReply, BackendChatRequest};

/// Upstream error bodies are cut to this many characters before being surfaced.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Ollama backend configuration.
pub struct OllamaConfig {
    pub base_url: String,
    pub http_client: reqwest::Client,
}

/// Ollama backend: `/api/chat` for completions, `/api/tags` for the model list.
pub struct Ollama {
    base_url: String,
    chat_url: String,
    tags_url: String,
    http_client: reqwest::Client,
}

impl Ollama {
    pub fn new(config: OllamaConfig) -> Result<Self, url::ParseError> {
        let chat_url = build_backend_url(&config.base_url, "/api/chat")?;
        let tags_url = build_backend_url(&config.base_url, "/api/tags")?;

        Ok(Self {
            base_url: config.base_url,
            chat_url,
            tags_url,
            http_client: config.http_client,
        })
    }
}

#[async_trait]
impl Backend for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn chat(&self, request: &BackendChatRequest) -> BackendCallOutcome<String> {
        let resp = match self
            .http_client
            .post(&self.chat_url)
            .json(request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return BackendCallOutcome::from_reqwest_error(&e),
        };

        read_json::<BackendChatReply>(resp, &self.chat_url)
            .await
            .map(|reply| reply.message.content)
    }

    async fn list_models(&self) -> BackendCallOutcome<serde_json::Value> {
        match self.http_client.get(&self.tags_url).send().await {
            Ok(resp) => read_json(resp, &self.tags_url).await,
            Err(e) => BackendCallOutcome::from_reqwest_error(&e),
        }
    }

    async fn status(&self) -> BackendCallOutcome<()> {
        let resp = match self.http_client.get(&self.tags_url).send().await {
            Ok(resp) => resp,
            Err(e) => return BackendCallOutcome::from_reqwest_error(&e),
        };

        let status = resp.status();
        if status.is_success() {
            return BackendCallOutcome::Success(());
        }
        let body = resp.text().await.unwrap_or_default();
        BackendCallOutcome::UpstreamError {
            status: status.as_u16(),
            body: truncate_body(&body),
        }
    }
}

/// Read the whole body; non-2xx statuses and undecodable 2xx bodies become upstream errors.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response, url: &str) -> BackendCallOutcome<T> {
    let status = resp.status();
    let body = match resp.text().await {
        Ok(body) => body,
        Err(e) => return BackendCallOutcome::from_reqwest_error(&e),
    };

    if !status.is_success() {
        return BackendCallOutcome::UpstreamError {
            status: status.as_u16(),
            body: truncate_body(&body),
        };
    }

    match serde_json::from_str(&body) {
        Ok(value) => BackendCallOutcome::Success(value),
        Err(e) => {
            warn!(url, error = %e, "backend returned an unexpected body");
            BackendCallOutcome::UpstreamError {
                status: status.as_u16(),
                body: truncate_body(&body),
            }
        }
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let mut cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        cut.push('…');
        cut
    }
}

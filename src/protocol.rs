use serde::{Deserialize, Serialize};

use crate::health::HealthState;
use crate::metrics::MetricsSnapshot;

/// Speaker of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One recorded turn of a conversation. Same shape as a backend message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Inbound chat request. History is role-tagged; pair-per-turn arrays are rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// Successful chat response.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub history: Vec<ChatTurn>,
    pub status: ReplyStatus,
}

/// Error body for `/chat`. `history` echoes the caller's input untouched.
#[derive(Debug, Serialize)]
pub struct ChatErrorResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ChatTurn>>,
    pub status: ReplyStatus,
    pub error: String,
    pub code: &'static str,
}

/// Error body for every non-chat route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: ReplyStatus,
    pub error: String,
    pub code: &'static str,
}

/// Backend `/api/chat` request body.
#[derive(Debug, Clone, Serialize)]
pub struct BackendChatRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
    pub stream: bool,
    pub options: SamplingOptions,
}

/// Generation options forwarded verbatim to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingOptions {
    pub temperature: f64,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
}

/// The part of the backend's `/api/chat` reply we read.
#[derive(Debug, Deserialize)]
pub struct BackendChatReply {
    pub message: BackendReplyMessage,
}

#[derive(Debug, Deserialize)]
pub struct BackendReplyMessage {
    pub content: String,
}

/// Liveness response for `GET /`.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: HealthState,
    pub backend_url: String,
    pub model: String,
}

/// Counter snapshot plus the last known backend state.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
    pub backend: HealthState,
    pub backend_url: String,
}

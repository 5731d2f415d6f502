pub mod ollama;

#[cfg(test)]
pub(crate) mod mock;

pub use ollama::{Ollama, OllamaConfig};

use async_trait::async_trait;
use url::Url;

use crate::protocol::BackendChatRequest;

/// Backend trait for local LLM runtimes.
///
/// Implementations perform a single HTTP exchange per call and never retry.
/// Wall-clock bounds are applied by the caller, so a slow call is cancelled by
/// dropping the returned future.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable name for this backend.
    fn name(&self) -> &str;

    /// Base URL for API requests.
    fn base_url(&self) -> &str;

    /// Send a non-streaming chat request and return the assistant reply text.
    async fn chat(&self, request: &BackendChatRequest) -> BackendCallOutcome<String>;

    /// Fetch the backend's model list.
    async fn list_models(&self) -> BackendCallOutcome<serde_json::Value>;

    /// Cheap read-only reachability check. Judged on the status code alone;
    /// the body is never decoded.
    async fn status(&self) -> BackendCallOutcome<()>;
}

/// Result of one outbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCallOutcome<T> {
    Success(T),
    TransportError {
        kind: TransportErrorKind,
        detail: String,
    },
    UpstreamError {
        status: u16,
        body: String,
    },
    Timeout,
}

/// Transport failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, DNS failure, or host unreachable.
    Connect,
    /// The request could not be constructed locally.
    Build,
    /// Connection dropped or failed mid-exchange.
    Io,
}

impl TransportErrorKind {
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_builder() {
            TransportErrorKind::Build
        } else {
            TransportErrorKind::Io
        }
    }
}

impl<T> BackendCallOutcome<T> {
    /// Map a reqwest failure into an outcome.
    pub fn from_reqwest_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendCallOutcome::Timeout
        } else {
            BackendCallOutcome::TransportError {
                kind: TransportErrorKind::from_reqwest(err),
                detail: err.to_string(),
            }
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> BackendCallOutcome<U> {
        match self {
            BackendCallOutcome::Success(value) => BackendCallOutcome::Success(f(value)),
            BackendCallOutcome::TransportError { kind, detail } => {
                BackendCallOutcome::TransportError { kind, detail }
            }
            BackendCallOutcome::UpstreamError { status, body } => {
                BackendCallOutcome::UpstreamError { status, body }
            }
            BackendCallOutcome::Timeout => BackendCallOutcome::Timeout,
        }
    }
}

/// Join a backend base URL and an API path, keeping any base path prefix.
pub fn build_backend_url(base_url: &str, path: &str) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(base_url)?;

    let normalized_base = parsed.path().trim_end_matches('/');
    let trimmed_path = path.trim_start_matches('/');

    let full_path = match (normalized_base.is_empty(), trimmed_path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{trimmed_path}"),
        (false, true) => normalized_base.to_string(),
        (false, false) => format!("{normalized_base}/{trimmed_path}"),
    };

    parsed.set_path(&full_path);
    parsed.set_query(None);

    Ok(parsed.to_string())
}

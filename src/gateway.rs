use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::backend::{Backend, BackendCallOutcome, TransportErrorKind};
use crate::error::{ChatFailure, GatewayError};
use crate::health::HealthSupervisor;
use crate::metrics::GatewayMetrics;
use crate::protocol::{
    BackendChatRequest, ChatRequest, ChatResponse, ChatTurn, ReplyStatus, SamplingOptions,
};

/// Per-deployment chat settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub model: String,
    pub options: SamplingOptions,
    pub request_timeout: Duration,
}

/// Validates chat requests, forwards them to the backend once, and folds the
/// outcome back into the caller's history.
pub struct Gateway {
    backend: Arc<dyn Backend>,
    health: Arc<HealthSupervisor>,
    metrics: Arc<GatewayMetrics>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(
        backend: Arc<dyn Backend>,
        health: Arc<HealthSupervisor>,
        metrics: Arc<GatewayMetrics>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            backend,
            health,
            metrics,
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn backend_url(&self) -> &str {
        self.backend.base_url()
    }

    /// Run one chat exchange.
    ///
    /// On success the history gains the user turn followed by the assistant
    /// turn. On any failure the history is handed back untouched.
    pub async fn handle_chat(&self, request: ChatRequest) -> Result<ChatResponse, ChatFailure> {
        self.metrics.record_request();
        let start = Instant::now();

        let ChatRequest { message, history } = request;

        if message.trim().is_empty() {
            self.metrics.record_error();
            return Err(ChatFailure {
                error: GatewayError::InvalidRequest("message must not be empty".into()),
                history: Some(history),
            });
        }

        let payload = BackendChatRequest {
            model: self.config.model.clone(),
            messages: to_backend_messages(&history, &message),
            stream: false,
            options: self.config.options.clone(),
        };

        let outcome = self.bounded(self.backend.chat(&payload)).await;
        self.health.classify(&outcome);

        match self.settle(outcome) {
            Ok(reply) => {
                let elapsed = start.elapsed();
                self.metrics.record_success(elapsed);
                debug!(
                    turns = history.len(),
                    duration_ms = elapsed.as_millis() as u64,
                    "chat completed"
                );

                let mut history = history;
                history.push(ChatTurn::user(message));
                history.push(ChatTurn::assistant(reply.clone()));

                Ok(ChatResponse {
                    reply,
                    history,
                    status: ReplyStatus::Success,
                })
            }
            Err(error) => {
                self.metrics.record_error();
                Err(ChatFailure {
                    error,
                    history: Some(history),
                })
            }
        }
    }

    /// Relay the backend's model list.
    pub async fn list_models(&self) -> Result<serde_json::Value, GatewayError> {
        let outcome = self.bounded(self.backend.list_models()).await;
        self.health.classify(&outcome);
        self.settle(outcome)
    }

    /// Apply the request timeout. Expiry drops the call, which releases its connection.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = BackendCallOutcome<T>>,
    ) -> BackendCallOutcome<T> {
        match tokio::time::timeout(self.config.request_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => BackendCallOutcome::Timeout,
        }
    }

    /// Translate a call outcome into the caller-facing taxonomy.
    fn settle<T>(&self, outcome: BackendCallOutcome<T>) -> Result<T, GatewayError> {
        let backend = self.backend.name();
        let url = self.backend.base_url();

        match outcome {
            BackendCallOutcome::Success(value) => Ok(value),
            BackendCallOutcome::Timeout => {
                warn!(
                    backend,
                    url,
                    timeout_ms = self.config.request_timeout.as_millis() as u64,
                    "backend request timed out"
                );
                Err(GatewayError::ServiceUnavailable(format!(
                    "backend did not respond within {:?}; it may be overloaded or still loading the model",
                    self.config.request_timeout
                )))
            }
            BackendCallOutcome::TransportError { kind, detail } => match kind {
                TransportErrorKind::Build => {
                    error!(backend, url, error = %detail, "failed to build backend request");
                    Err(GatewayError::Internal("failed to build backend request".into()))
                }
                TransportErrorKind::Connect => {
                    warn!(backend, url, error = %detail, "backend connection refused");
                    Err(GatewayError::ServiceUnavailable(format!(
                        "cannot connect to backend at {url}; make sure the {backend} service is running"
                    )))
                }
                TransportErrorKind::Io => {
                    warn!(backend, url, error = %detail, "backend connection failed");
                    Err(GatewayError::ServiceUnavailable(format!(
                        "connection to backend at {url} failed; make sure the {backend} service is running"
                    )))
                }
            },
            BackendCallOutcome::UpstreamError { status, body } => {
                warn!(backend, url, status, "backend returned an error status");
                Err(GatewayError::Upstream { status, body })
            }
        }
    }
}

/// Flatten history into backend messages and append the new user message last.
pub fn to_backend_messages(history: &[ChatTurn], message: &str) -> Vec<ChatTurn> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend_from_slice(history);
    messages.push(ChatTurn::user(message));
    messages
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::protocol::{ChatErrorResponse, ChatTurn, ErrorResponse, ReplyStatus};

/// Errors surfaced to gateway callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or empty request. Never retried, never reaches the backend.
    #[error("{0}")]
    InvalidRequest(String),

    /// Backend unreachable or too slow. Safe for the caller to retry.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Backend answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream { status, .. } => match StatusCode::from_u16(*status) {
                Ok(code) if code.is_server_error() => code,
                _ => StatusCode::BAD_GATEWAY,
            },
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::ServiceUnavailable(_) => "service_unavailable",
            GatewayError::Upstream { .. } => "upstream_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                status: ReplyStatus::Error,
                error: self.to_string(),
                code: self.code(),
            }),
        )
            .into_response()
    }
}

/// A failed chat exchange. Carries the caller's history back exactly as received.
#[derive(Debug)]
pub struct ChatFailure {
    pub error: GatewayError,
    pub history: Option<Vec<ChatTurn>>,
}

impl IntoResponse for ChatFailure {
    fn into_response(self) -> Response {
        (
            self.error.status_code(),
            Json(ChatErrorResponse {
                reply: String::new(),
                history: self.history,
                status: ReplyStatus::Error,
                error: self.error.to_string(),
                code: self.error.code(),
            }),
        )
            .into_response()
    }
}

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

use crate::error::{ChatFailure, GatewayError};
use crate::gateway::Gateway;
use crate::health::HealthSupervisor;
use crate::metrics::GatewayMetrics;
use crate::protocol::{ChatRequest, HealthResponse, ServiceInfo, StatsResponse};

/// Shared application state.
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub health: Arc<HealthSupervisor>,
    pub metrics: Arc<GatewayMetrics>,
}

/// Liveness of the gateway process itself; never touches the backend.
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "running",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Health check handler. Probes the backend and reports its state alongside our own.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let backend = state.health.probe().await;
    Json(HealthResponse {
        status: "healthy",
        backend,
        backend_url: state.gateway.backend_url().to_string(),
        model: state.gateway.model().to_string(),
    })
}

/// Chat endpoint.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "rejected chat body");
            state.metrics.record_request();
            state.metrics.record_error();
            return ChatFailure {
                error: GatewayError::InvalidRequest(rejection.body_text()),
                history: None,
            }
            .into_response();
        }
    };

    match state.gateway.handle_chat(request).await {
        Ok(resp) => Json(resp).into_response(),
        Err(failure) => failure.into_response(),
    }
}

/// Models endpoint, relayed from the backend.
pub async fn models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    state.gateway.list_models().await.map(Json)
}

/// Counter snapshot.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        metrics: state.metrics.snapshot(),
        backend: state.health.current(),
        backend_url: state.gateway.backend_url().to_string(),
    })
}

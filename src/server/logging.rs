use std::time::Instant;

use axum::body::Body;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{error, info, warn};

/// Paths polled by liveness checkers.
const QUIET_PATHS: &[&str] = &["/", "/api/health"];

/// Which part of the gateway a path belongs to, for filtering access logs.
pub fn route_kind(path: &str) -> &'static str {
    match path {
        "/chat" | "/api/chat" => "chat",
        "/api/models" => "models",
        "/api/stats" => "stats",
        _ => "other",
    }
}

/// Access log under the `access` target, one line per request.
///
/// Liveness paths are skipped. The browser `Origin` is recorded so CORS
/// rejections can be traced back to the calling page.
pub async fn logging_middleware(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();

    if QUIET_PATHS.contains(&path.as_str()) {
        return next.run(req).await;
    }

    let kind = route_kind(&path);
    let method = req.method().to_string();
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;

    match status {
        500.. => error!(target: "access", kind, method, path, origin, status, duration_ms, "failed"),
        400..=499 => warn!(target: "access", kind, method, path, origin, status, duration_ms, "rejected"),
        _ => info!(target: "access", kind, method, path, origin, status, duration_ms, "served"),
    }

    response
}

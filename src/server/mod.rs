pub mod cors;
pub mod handlers;
pub mod logging;

use std::sync::Arc;

use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;

use self::handlers::AppState;

/// Build the axum router: chat, model list, health and stats routes behind CORS.
pub fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/api/chat", post(handlers::chat))
        .route("/api/models", get(handlers::models))
        .route("/api/stats", get(handlers::stats))
        .layer(axum_middleware::from_fn(logging::logging_middleware))
        .layer(cors::build_cors_layer(cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, post};
    use axum::Json;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::{Backend, BackendCallOutcome, Ollama, OllamaConfig};
    use crate::gateway::{Gateway, GatewayConfig};
    use crate::health::HealthSupervisor;
    use crate::metrics::GatewayMetrics;
    use crate::protocol::SamplingOptions;

    fn app_with(backend: Arc<dyn Backend>, cors_origins: &[&str]) -> Router {
        let health = Arc::new(HealthSupervisor::new(
            backend.clone(),
            Duration::from_millis(500),
        ));
        let metrics = Arc::new(GatewayMetrics::new());
        let gateway = Arc::new(Gateway::new(
            backend,
            health.clone(),
            metrics.clone(),
            GatewayConfig {
                model: "qwen2.5:7b".into(),
                options: SamplingOptions {
                    temperature: 0.7,
                    top_p: 0.9,
                    num_predict: None,
                },
                request_timeout: Duration::from_secs(2),
            },
        ));
        let state = Arc::new(AppState {
            gateway,
            health,
            metrics,
        });
        let origins: Vec<String> = cors_origins.iter().map(|s| s.to_string()).collect();
        build_router(state, &origins)
    }

    fn ollama_at(base_url: String) -> Arc<dyn Backend> {
        Arc::new(
            Ollama::new(OllamaConfig {
                base_url,
                http_client: reqwest::Client::new(),
            })
            .unwrap(),
        )
    }

    fn dead_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    async fn spawn_ollama_stub() -> String {
        let app = Router::new()
            .route(
                "/api/chat",
                post(|Json(body): Json<Value>| async move {
                    let last = body["messages"]
                        .as_array()
                        .and_then(|m| m.last())
                        .and_then(|m| m["content"].as_str())
                        .unwrap_or_default()
                        .to_string();
                    let reply = if last == "你好" { "你好！".to_string() } else { last };
                    Json(json!({"message": {"role": "assistant", "content": reply}, "done": true}))
                }),
            )
            .route(
                "/api/tags",
                get(|| async { Json(json!({"models": [{"name": "qwen2.5:7b"}]})) }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}")
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chat_roundtrip_through_ollama() {
        let app = app_with(ollama_at(spawn_ollama_stub().await), &["*"]);

        let resp = app
            .oneshot(post_json("/chat", r#"{"message":"你好","history":[]}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            json!({
                "reply": "你好！",
                "history": [
                    {"role": "user", "content": "你好"},
                    {"role": "assistant", "content": "你好！"}
                ],
                "status": "success"
            })
        );
    }

    #[tokio::test]
    async fn test_api_chat_alias() {
        let app = app_with(Arc::new(MockBackend::replying("hi")), &["*"]);

        let resp = app
            .oneshot(post_json("/api/chat", r#"{"message":"hello"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["reply"], json!("hi"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_503() {
        let app = app_with(ollama_at(dead_url()), &["*"]);

        let resp = app
            .oneshot(post_json("/chat", r#"{"message":"你好","history":[]}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(resp).await;
        assert_eq!(body["status"], json!("error"));
        assert_eq!(body["code"], json!("service_unavailable"));
        assert_eq!(body["history"], json!([]));
        assert!(body["error"].as_str().unwrap().contains("running"));
    }

    #[tokio::test]
    async fn test_blank_message_is_400_without_backend_call() {
        let backend = Arc::new(MockBackend::replying("unused"));
        let app = app_with(backend.clone(), &["*"]);

        let history = json!([{"role": "user", "content": "a"}, {"role": "assistant", "content": "b"}]);
        let body = json!({"message": "   ", "history": history.clone()}).to_string();
        let resp = app.oneshot(post_json("/chat", &body)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["status"], json!("error"));
        assert_eq!(body["code"], json!("invalid_request"));
        assert_eq!(body["history"], history);
        assert_eq!(backend.chat_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_structured_400() {
        let backend = Arc::new(MockBackend::replying("unused"));
        let app = app_with(backend.clone(), &["*"]);

        for body in [
            "not json",
            r#"{"history":[]}"#,
            r#"{"message":"hi","history":[["hello","hi there"]]}"#,
        ] {
            let resp = app.clone().oneshot(post_json("/chat", body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
            let json = json_body(resp).await;
            assert_eq!(json["status"], json!("error"));
            assert!(json.get("history").is_none());
        }
        assert_eq!(backend.chat_calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let backend = Arc::new(MockBackend::failing(BackendCallOutcome::UpstreamError {
            status: 404,
            body: r#"{"error":"model 'qwen2.5:7b' not found"}"#.into(),
        }));
        let app = app_with(backend, &["*"]);

        let resp = app
            .oneshot(post_json("/chat", r#"{"message":"hello"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(resp).await;
        assert_eq!(body["code"], json!("upstream_error"));
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_root_liveness() {
        let app = app_with(ollama_at(dead_url()), &["*"]);

        let resp = app.oneshot(get_req("/")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], json!("running"));
    }

    #[tokio::test]
    async fn test_health_reports_backend_state() {
        let app = app_with(ollama_at(spawn_ollama_stub().await), &["*"]);
        let resp = app.oneshot(get_req("/api/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["backend"], json!("healthy"));
        assert!(body["max_response_ms"].is_u64());
        assert!(body["min_response_ms"].is_u64());
        assert_eq!(body["model"], json!("qwen2.5:7b"));

        let app = app_with(ollama_at(dead_url()), &["*"]);
        let resp = app.oneshot(get_req("/api/health")).await.unwrap();
        assert_eq!(json_body(resp).await["backend"], json!("unreachable"));
    }

    #[tokio::test]
    async fn test_models_relayed() {
        let app = app_with(ollama_at(spawn_ollama_stub().await), &["*"]);

        let resp = app.oneshot(get_req("/api/models")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            json!({"models": [{"name": "qwen2.5:7b"}]})
        );
    }

    #[tokio::test]
    async fn test_stats_counts_requests() {
        let app = app_with(Arc::new(MockBackend::replying("ok")), &["*"]);

        app.clone()
            .oneshot(post_json("/chat", r#"{"message":"one"}"#))
            .await
            .unwrap();
        app.clone()
            .oneshot(post_json("/chat", r#"{"message":""}"#))
            .await
            .unwrap();

        let resp = app.oneshot(get_req("/api/stats")).await.unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["request_count"], json!(2));
        assert_eq!(body["success_count"], json!(1));
        assert_eq!(body["error_count"], json!(1));
        assert_eq!(body["backend"], json!("healthy"));
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_configured_origins() {
        let app = app_with(
            Arc::new(MockBackend::replying("ok")),
            &["http://localhost:3000"],
        );

        let resp = app
            .clone()
            .oneshot(preflight("http://localhost:3000"))
            .await
            .unwrap();
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:3000")
        );

        let resp = app.oneshot(preflight("http://evil.example")).await.unwrap();
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_cors_configured_methods_and_headers() {
        let app = app_with(
            Arc::new(MockBackend::replying("ok")),
            &["http://localhost:3000"],
        );

        let req = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "DELETE")
            .header("access-control-request-headers", "authorization")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_ascii_lowercase()
        };
        let methods = header("access-control-allow-methods");
        let headers = header("access-control-allow-headers");

        assert!(methods.contains("post"), "methods: {methods}");
        assert!(!methods.contains("delete"), "methods: {methods}");
        assert!(headers.contains("content-type"), "headers: {headers}");
        assert!(!headers.contains("authorization"), "headers: {headers}");
    }

    #[tokio::test]
    async fn test_cors_wildcard() {
        let app = app_with(Arc::new(MockBackend::replying("ok")), &["*"]);

        let resp = app.oneshot(preflight("http://anything.test")).await.unwrap();
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}

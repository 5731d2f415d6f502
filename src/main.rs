mod backend;
mod config;
mod error;
mod gateway;
mod health;
mod metrics;
mod protocol;
mod server;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use backend::{Backend, Ollama, OllamaConfig};
use config::{normalize_addr, Config};
use gateway::{Gateway, GatewayConfig};
use health::{HealthState, HealthSupervisor};
use metrics::GatewayMetrics;
use server::handlers::AppState;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    // Configure logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt().json().with_env_filter(filter).init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }

    // HTTP client for backend calls. Per-call deadlines are applied by the gateway.
    let http_client = match reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to build HTTP client");
            std::process::exit(1);
        }
    };

    let base_url = config.backend_base_url();
    let backend: Arc<dyn Backend> = match Ollama::new(OllamaConfig {
        base_url: base_url.clone(),
        http_client,
    }) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            error!(base_url, error = %e, "invalid backend URL");
            std::process::exit(1);
        }
    };

    info!(
        backend = backend.name(),
        base_url = backend.base_url(),
        model = config.model,
        timeout_secs = config.request_timeout_secs,
        "using backend"
    );

    let health = Arc::new(HealthSupervisor::new(
        backend.clone(),
        config.probe_timeout(),
    ));
    let metrics = Arc::new(GatewayMetrics::new());
    let gateway = Arc::new(Gateway::new(
        backend.clone(),
        health.clone(),
        metrics.clone(),
        GatewayConfig {
            model: config.model.clone(),
            options: config.sampling_options(),
            request_timeout: config.request_timeout(),
        },
    ));

    if health.probe().await != HealthState::Healthy {
        warn!(
            base_url = backend.base_url(),
            "backend not healthy at startup; chat requests will still be attempted"
        );
    }

    // Background probe, dropped with the Tokio runtime on shutdown
    if let Some(interval) = config.probe_interval() {
        let probe_health = health.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                probe_health.probe().await;
            }
        });
    }

    let cors_origins = config.cors_origin_list();
    if cors_origins.is_empty() || cors_origins.iter().any(|o| o == "*") {
        warn!("CORS allows any origin - restrict CORS_ORIGINS outside local development");
    } else {
        info!(origins = ?cors_origins, "CORS origins configured");
    }

    let state = Arc::new(AppState {
        gateway,
        health,
        metrics,
    });
    let app = server::build_router(state, &cors_origins);

    let addr = normalize_addr(&config.addr);
    let listener = TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        error!(addr = addr, error = %e, "failed to bind");
        std::process::exit(1);
    });

    info!(addr = addr, "server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "server error");
            std::process::exit(1);
        });

    info!("server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

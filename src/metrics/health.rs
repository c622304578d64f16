//! HTTP health, readiness and Prometheus endpoints
//!
//! Served with Axum next to the service. `/health` and `/stats` run the full
//! component check, `/ready` and `/alive` are cheap checks for orchestrators.

use crate::metrics::collector::MetricsCollector;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    pub port: u16,
    /// Bind address, "0.0.0.0" for all interfaces
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub app_state: Option<Arc<AppState>>,
}

/// Health server that provides HTTP endpoints for monitoring
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                app_state: None,
            },
            shutdown_tx,
        }
    }

    /// Attach the application whose components are checked
    pub fn with_app_state(mut self, app_state: Arc<AppState>) -> Self {
        self.state.app_state = Some(app_state);
        self
    }

    /// Bind and serve until `stop` is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind health server to {}", addr))?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .with_state(self.state.clone())
    }

    /// Signal the server to finish in-flight requests and exit
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping health server...");

        if self.shutdown_tx.send(()).is_err() {
            warn!("Health server was not running");
        }
        Ok(())
    }
}

/// Prometheus text exposition of everything in the collector's registry
pub fn render_metrics(metrics_collector: &MetricsCollector) -> Result<String> {
    let metric_families = metrics_collector.registry().gather();
    TextEncoder::new()
        .encode_to_string(&metric_families)
        .context("Failed to encode metrics")
}

fn status_code(status: &HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn not_initialized() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": "unhealthy",
            "service": SERVICE_NAME,
            "version": SERVICE_VERSION,
            "error": "Service not initialized"
        })),
    )
        .into_response()
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "endpoints": ["/health", "/ready", "/alive", "/metrics", "/stats"]
    }))
}

/// Full component check
async fn health_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Health check requested");

    let Some(app_state) = state.app_state else {
        return not_initialized();
    };
    match HealthCheck::check(app_state).await {
        Ok(health) => (status_code(&health.status), Json(health)).into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn ready_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Readiness check requested");

    let Some(app_state) = state.app_state else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized").into_response();
    };
    match HealthCheck::readiness_check(app_state).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready").into_response(),
        Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready").into_response(),
        Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready").into_response(),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready").into_response()
        }
    }
}

async fn alive_handler(State(state): State<HealthServerState>) -> Response {
    let alive = match state.app_state {
        Some(app_state) => matches!(
            HealthCheck::liveness_check(app_state).await,
            Ok(HealthStatus::Healthy)
        ),
        None => false,
    };

    if alive {
        (StatusCode::OK, "Alive").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not alive").into_response()
    }
}

async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    match render_metrics(&state.metrics_collector) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("{:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Group and queue counters for humans
async fn stats_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Stats endpoint requested");

    let Some(app_state) = state.app_state else {
        return not_initialized();
    };
    match HealthCheck::check(app_state).await {
        Ok(health) => Json(json!({
            "service": {
                "name": health.service,
                "version": health.version,
                "status": health.status,
                "uptime_seconds": health.stats.uptime_seconds
            },
            "groups": {
                "parties": health.stats.active_parties,
                "matches": health.stats.active_matches
            },
            "queue": {
                "queued_parties": health.stats.queued_parties,
                "matches_formed": health.stats.matches_formed
            },
            "components": health.checks,
            "timestamp": health.timestamp
        }))
        .into_response(),
        Err(e) => {
            error!("Failed to get stats: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Failed to get service stats" })),
            )
                .into_response()
        }
    }
}

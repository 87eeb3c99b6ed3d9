//! Diagnostics HTTP endpoint: Prometheus metrics and a health probe.
//! Operational only; the ingestion path does not depend on it.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::Result;
use crate::metrics::PipelineMetrics;

#[derive(Clone)]
struct AppState {
    metrics: Arc<PipelineMetrics>,
    started_at: Instant,
}

pub struct HttpServer {
    metrics: Arc<PipelineMetrics>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(metrics: Arc<PipelineMetrics>, bind_addr: SocketAddr) -> Self {
        Self { metrics, bind_addr }
    }

    /// Serve until the cancellation token fires.
    pub async fn start(self, cancel: CancellationToken) -> Result<()> {
        let state = AppState {
            metrics: self.metrics,
            started_at: Instant::now(),
        };

        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        info!("diagnostics HTTP server listening on {}", self.bind_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;
        Ok(())
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.export() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to export metrics: {}", e),
        )
            .into_response(),
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

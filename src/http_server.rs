//! HTTP server for metrics and health endpoints.
//!
//! Serves the Prometheus text exposition at `/metrics`, a JSON snapshot at
//! `/metrics/json`, and a basic health check at `/health`. Runs beside
//! whichever frontend the process was started in, on its own port.

use crate::metrics::PrometheusMetrics;
use crate::{PulsemqError, Result};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct HttpMetricsServer {
    metrics: Arc<PrometheusMetrics>,
    addr: SocketAddr,
}

impl HttpMetricsServer {
    pub fn new(metrics: Arc<PrometheusMetrics>, addr: SocketAddr) -> Self {
        Self { metrics, addr }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/metrics/json", get(metrics_json_handler))
            .route("/health", get(health_handler))
            .with_state(Arc::clone(&self.metrics))
    }

    /// Bind the listener and serve until the process exits.
    pub async fn start(self) -> Result<()> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            PulsemqError::Network(format!(
                "failed to bind metrics server to {}: {}",
                self.addr, e
            ))
        })?;
        info!("metrics server listening on {}", self.addr);

        axum::serve(listener, router)
            .await
            .map_err(|e| PulsemqError::Network(format!("metrics server error: {}", e)))?;
        Ok(())
    }
}

async fn metrics_handler(State(metrics): State<Arc<PrometheusMetrics>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        metrics.encode_text(),
    )
}

async fn metrics_json_handler(State(metrics): State<Arc<PrometheusMetrics>>) -> impl IntoResponse {
    Json(metrics.snapshot())
}

async fn health_handler() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "application/json")],
        r#"{"status":"healthy","service":"pulsemq"}"#,
    )
}

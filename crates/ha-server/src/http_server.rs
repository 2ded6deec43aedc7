//! HTTP server for the Prometheus metrics and HA status endpoints.

use crate::metrics::MetricsRegistry;
use crate::status::StatusBoard;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use neighbors::NeighborRegistry;
use prometheus_client::encoding::text::encode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricsRegistry>,
    pub status: Arc<StatusBoard>,
    pub registry: Arc<NeighborRegistry>,
}

/// HTTP server for metrics and status
pub struct MetricsServer {
    state: AppState,
    listen_addr: String,
}

impl MetricsServer {
    pub fn new(state: AppState, listen_addr: String) -> Self {
        Self { state, listen_addr }
    }

    /// Build the router
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/status", get(status_handler))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(state)
    }

    /// Serve until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) -> std::io::Result<()> {
        info!(listen_addr = %self.listen_addr, "Starting status HTTP server");

        let app = Self::router(self.state);
        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(listen_addr = %self.listen_addr, "Serving /metrics and /status");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    }
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &state.metrics.registry) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}

/// JSON status snapshot
async fn status_handler(State(state): State<AppState>) -> Response {
    Json(state.status.report(&state.registry).await).into_response()
}

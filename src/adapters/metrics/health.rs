//! Health Check Server - Liveness, Readiness and Metrics
//!
//! One axum 0.7 router:
//! - `/live`: 200 while the process runs
//! - `/ready`: 200 only while the feed is `Connected`, else 503
//! - `/metrics`: Prometheus text format

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument, warn};

use super::TickerMetrics;
use crate::domain::ConnectionState;

/// State shared with the handlers.
#[derive(Clone)]
struct HealthState {
    metrics: Arc<TickerMetrics>,
    connection: watch::Receiver<ConnectionState>,
}

/// Axum-based health and metrics server.
pub struct HealthServer {
    state: HealthState,
    bind_address: String,
}

impl HealthServer {
    pub fn new(
        metrics: Arc<TickerMetrics>,
        connection: watch::Receiver<ConnectionState>,
        bind_address: impl Into<String>,
    ) -> Self {
        Self {
            state: HealthState { metrics, connection },
            bind_address: bind_address.into(),
        }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::metrics))
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
    pub async fn run(self, shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.bind_address).await?;
        self.serve(listener, shutdown_rx).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        info!(address = %listener.local_addr()?, "Health server started");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
        let connection = *state.connection.borrow();
        if connection == ConnectionState::Connected {
            (StatusCode::OK, "READY".to_string())
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, format!("NOT READY ({connection})"))
        }
    }

    async fn metrics(State(state): State<HealthState>) -> impl IntoResponse {
        match state.metrics.render() {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => {
                warn!(error = %e, "Metrics encoding failed");
                (StatusCode::INTERNAL_SERVER_ERROR, String::new())
            }
        }
    }
}

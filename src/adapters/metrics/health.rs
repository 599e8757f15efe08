//! Health and Diagnostics Server - Probes over the Market Service
//!
//! Exposes via axum 0.7:
//! - `/live`: process is up
//! - `/ready`: a snapshot is held and shutdown has not begun
//! - `/snapshot/metrics`: JSON metrics of the current snapshot
//! - `/tables`: on-demand table discovery

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::usecases::MarketIntelService;

/// Shared state behind every route.
#[derive(Clone)]
pub struct HealthState {
    /// Service answering snapshot and discovery requests.
    pub service: MarketIntelService,
    /// Set once graceful shutdown starts; readiness then reports 503.
    pub draining: Arc<AtomicBool>,
}

impl HealthState {
    pub fn new(service: MarketIntelService) -> Self {
        Self {
            service,
            draining: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ready once a snapshot is cached and we are not draining.
    pub async fn is_ready(&self) -> bool {
        !self.draining.load(Ordering::Relaxed) && self.service.cache().has_snapshot().await
    }
}

/// Axum-based health and diagnostics HTTP server.
pub struct HealthServer {
    state: HealthState,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    pub const fn new(state: HealthState, port: u16) -> Self {
        Self { state, port }
    }

    /// Routes, without binding a listener.
    pub fn router(state: HealthState) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/snapshot/metrics", get(Self::snapshot_metrics))
            .route("/tables", get(Self::tables))
            .with_state(state)
    }

    /// Serve until the shutdown signal fires.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = Self::router(self.state);

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
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
        if state.is_ready().await {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    /// Rebuilds first when stale.
    async fn snapshot_metrics(State(state): State<HealthState>) -> Response {
        match state.service.get_snapshot().await {
            Ok(snapshot) => Json(snapshot.metrics.clone()).into_response(),
            Err(e) => {
                warn!(error = %e, "Snapshot unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
            }
        }
    }

    async fn tables(State(state): State<HealthState>) -> Response {
        Json(state.service.discover_all_tables().await).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::config::loader::parse_config;
    use crate::domain::record::RawRow;
    use crate::error::{DiscoveryUnavailable, SourceFetchError};
    use crate::ports::clock::ManualClock;
    use crate::ports::observer::NoopObserver;
    use crate::ports::table_client::{QueryOptions, RemoteTableClient};

    struct OneRow;

    #[async_trait]
    impl RemoteTableClient for OneRow {
        async fn query(&self, _: &str, _: &QueryOptions) -> Result<Vec<RawRow>, SourceFetchError> {
            Ok(vec![json!({ "name": "Implant", "market_size": 10 })])
        }

        async fn row_count(&self, _: &str) -> Result<u64, SourceFetchError> {
            Ok(1)
        }

        async fn list_tables(&self) -> Result<Vec<String>, DiscoveryUnavailable> {
            Ok(Vec::new())
        }
    }

    fn state() -> HealthState {
        let config = parse_config(
            r#"
            [service]
            name = "test"

            [remote]
            base_url = "http://localhost:54321"
            "#,
        )
        .unwrap();
        HealthState::new(MarketIntelService::from_config(
            &config,
            Arc::new(OneRow),
            Arc::new(ManualClock::new(0)),
            Arc::new(NoopObserver),
        ))
    }

    #[tokio::test]
    async fn test_ready_after_first_snapshot() {
        let state = state();
        let status = HealthServer::readiness(State(state.clone()))
            .await
            .into_response()
            .status();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let metrics = HealthServer::snapshot_metrics(State(state.clone())).await;
        assert_eq!(metrics.status(), StatusCode::OK);

        let status = HealthServer::readiness(State(state.clone()))
            .await
            .into_response()
            .status();
        assert_eq!(status, StatusCode::OK);

        state.draining.store(true, Ordering::Relaxed);
        assert!(!state.is_ready().await);
    }
}

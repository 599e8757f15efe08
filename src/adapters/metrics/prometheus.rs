//! Prometheus Metrics Registry - Cache and Rebuild Observability
//!
//! Registers and exposes Prometheus metrics on :9090. Implements the
//! `CacheObserver` port so the cache and rebuild usecases feed it
//! directly. Covers rebuild outcomes and latency, per-table source
//! failures, cache hits versus coalesced waiters, and snapshot size.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::domain::snapshot::AggregationSnapshot;
use crate::ports::observer::CacheObserver;

/// Centralized Prometheus metrics for the engine.
///
/// All metrics follow the naming convention `market_engine_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Completed rebuilds by outcome (`success`, `failure`).
    pub rebuilds: IntCounterVec,
    /// Rebuild wall time in seconds.
    pub rebuild_duration_seconds: Histogram,
    /// Failed source fetches by table.
    pub source_failures: IntCounterVec,
    /// Snapshot reads by result (`hit`, `miss`, `coalesced`, `retained`).
    pub cache_requests: IntCounterVec,
    /// Records in the installed snapshot by kind.
    pub snapshot_records: GaugeVec,
    /// Total market size of the installed snapshot.
    pub snapshot_market_size: Gauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let rebuilds = IntCounterVec::new(
            Opts::new("market_engine_rebuilds_total", "Completed snapshot rebuilds"),
            &["outcome"],
        )?;

        let rebuild_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "market_engine_rebuild_duration_seconds",
                "Snapshot rebuild wall time in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        let source_failures = IntCounterVec::new(
            Opts::new(
                "market_engine_source_failures_total",
                "Source fetches that failed during a rebuild",
            ),
            &["table"],
        )?;

        let cache_requests = IntCounterVec::new(
            Opts::new(
                "market_engine_cache_requests_total",
                "Snapshot reads (hit, miss, coalesced, retained)",
            ),
            &["result"],
        )?;

        let snapshot_records = GaugeVec::new(
            Opts::new(
                "market_engine_snapshot_records",
                "Records held by the cached snapshot",
            ),
            &["kind"],
        )?;

        let snapshot_market_size = Gauge::new(
            "market_engine_snapshot_market_size_usd_millions",
            "Total procedure market size in the cached snapshot",
        )?;

        registry.register(Box::new(rebuilds.clone()))?;
        registry.register(Box::new(rebuild_duration_seconds.clone()))?;
        registry.register(Box::new(source_failures.clone()))?;
        registry.register(Box::new(cache_requests.clone()))?;
        registry.register(Box::new(snapshot_records.clone()))?;
        registry.register(Box::new(snapshot_market_size.clone()))?;

        Ok(Self {
            registry,
            rebuilds,
            rebuild_duration_seconds,
            source_failures,
            cache_requests,
            snapshot_records,
            snapshot_market_size,
        })
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics);
                async move {
                    match metrics.render() {
                        Ok(body) => (StatusCode::OK, body),
                        Err(e) => {
                            warn!(error = %e, "Failed to encode metrics");
                            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

impl CacheObserver for MetricsRegistry {
    fn cache_hit(&self) {
        self.cache_requests.with_label_values(&["hit"]).inc();
    }

    fn rebuild_started(&self) {
        self.cache_requests.with_label_values(&["miss"]).inc();
    }

    fn rebuild_joined(&self) {
        self.cache_requests.with_label_values(&["coalesced"]).inc();
    }

    fn retained_served(&self) {
        self.cache_requests.with_label_values(&["retained"]).inc();
    }

    fn rebuild_finished(&self, succeeded: bool, elapsed: Duration) {
        let outcome = if succeeded { "success" } else { "failure" };
        self.rebuilds.with_label_values(&[outcome]).inc();
        self.rebuild_duration_seconds.observe(elapsed.as_secs_f64());
    }

    fn source_failed(&self, table: &str) {
        self.source_failures.with_label_values(&[table]).inc();
    }

    #[allow(clippy::cast_precision_loss)]
    fn snapshot_installed(&self, snapshot: &AggregationSnapshot) {
        let metrics = &snapshot.metrics;
        for (kind, count) in [
            ("procedures", metrics.total_procedures),
            ("companies", metrics.total_companies),
            ("categories", metrics.total_categories),
            ("territories", metrics.territory_count),
        ] {
            self.snapshot_records
                .with_label_values(&[kind])
                .set(count as f64);
        }
        self.snapshot_market_size
            .set(metrics.total_market_size_usd_millions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observer_hooks_update_metrics() {
        let metrics = MetricsRegistry::new().unwrap();

        metrics.cache_hit();
        metrics.cache_hit();
        metrics.rebuild_joined();
        metrics.retained_served();
        metrics.rebuild_finished(false, Duration::from_millis(120));
        metrics.source_failed("dental_companies");

        assert_eq!(metrics.cache_requests.with_label_values(&["hit"]).get(), 2);
        assert_eq!(
            metrics.cache_requests.with_label_values(&["coalesced"]).get(),
            1
        );
        assert_eq!(
            metrics.cache_requests.with_label_values(&["retained"]).get(),
            1
        );
        assert_eq!(metrics.rebuilds.with_label_values(&["failure"]).get(), 1);
        assert_eq!(metrics.rebuild_duration_seconds.get_sample_count(), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("market_engine_source_failures_total{table=\"dental_companies\"} 1"));
    }
}

//! Procedure Market Engine — Entry Point
//!
//! Loads configuration, wires the table store client into the market
//! service and serves metrics plus health/diagnostic endpoints until
//! SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create StoreClient (HTTP + rate limit) behind a per-call timeout
//! 4. Create MetricsRegistry (doubles as the cache observer)
//! 5. Build MarketIntelService (rebuilder, cache, discovery)
//! 6. Spawn Prometheus server on :9090 and health server on :8080
//! 7. Warm the cache with a first snapshot
//! 8. Wait for SIGINT → graceful shutdown

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use procedure_market_engine::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use procedure_market_engine::adapters::store::{StoreClient, StoreClientConfig, TimeoutTableClient};
use procedure_market_engine::config;
use procedure_market_engine::ports::clock::SystemClock;
use procedure_market_engine::ports::observer::{CacheObserver, NoopObserver};
use procedure_market_engine::usecases::MarketIntelService;

#[tokio::main]
async fn main() -> Result<()> {
  // ── 1. Load configuration ───────────────────────────────
  let config_path = std::env::args()
    .nth(1)
    .unwrap_or_else(|| "config.toml".to_string());
  let config = config::loader::load_config(&config_path).context("Failed to load configuration")?;

  // ── 2. Initialize structured JSON logging ───────────────
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
    )
    .json()
    .init();

  info!(
    name = %config.service.name,
    version = env!("CARGO_PKG_VERSION"),
    sources = config.sources.len(),
    ttl_seconds = config.cache.ttl_seconds,
    "Starting procedure market engine"
  );

  let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

  // ── 3. Table store client ───────────────────────────────
  let store_config = StoreClientConfig::from_config(&config.remote, &config.discovery);
  let store = StoreClient::new(store_config).context("Failed to create table store client")?;
  if !store.health_check().await {
    warn!(base_url = %config.remote.base_url, "Table store not reachable at startup");
  }
  let client = Arc::new(TimeoutTableClient::new(store, config.remote.timeout()));

  // ── 4. Metrics ──────────────────────────────────────────
  let metrics = if config.metrics.enabled {
    Some(Arc::new(
      MetricsRegistry::new().context("Failed to register metrics")?,
    ))
  } else {
    None
  };
  let observer: Arc<dyn CacheObserver> = match &metrics {
    Some(registry) => Arc::clone(registry) as Arc<dyn CacheObserver>,
    None => Arc::new(NoopObserver),
  };

  // ── 5. Market service ───────────────────────────────────
  let service = MarketIntelService::from_config(&config, client, Arc::new(SystemClock), observer);

  // ── 6. Metrics + health servers ─────────────────────────
  let metrics_handle = metrics.map(|registry| {
    let bind_address = config.metrics.bind_address.clone();
    let shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move {
      if let Err(e) = registry.serve(bind_address, shutdown).await {
        error!(error = %e, "Metrics server failed");
      }
    })
  });

  let health_state = HealthState::new(service.clone());
  let draining = Arc::clone(&health_state.draining);
  let health_server = HealthServer::new(health_state, config.metrics.health_port);
  let health_shutdown = shutdown_tx.subscribe();
  let health_handle = tokio::spawn(async move {
    if let Err(e) = health_server.run(health_shutdown).await {
      error!(error = %e, "Health server failed");
    }
  });

  // ── 7. Warm the cache ───────────────────────────────────
  let warmup = service.clone();
  tokio::spawn(async move {
    match warmup.get_snapshot().await {
      Ok(snapshot) => info!(
        procedures = snapshot.metrics.total_procedures,
        territories = snapshot.metrics.territory_count,
        expires_in_secs = warmup.cache().ttl().as_secs(),
        "Initial snapshot ready"
      ),
      Err(e) => warn!(error = %e, "Initial snapshot failed, next read will retry"),
    }
  });

  info!("All tasks spawned, engine is running");

  // ── 8. Wait for SIGINT ──────────────────────────────────
  signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
  info!("SIGINT received, initiating graceful shutdown");

  draining.store(true, Ordering::Relaxed);
  let _ = shutdown_tx.send(());

  let _ = tokio::time::timeout(Duration::from_secs(5), health_handle).await;
  if let Some(handle) = metrics_handle {
    let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
  }

  info!("Shutdown complete");
  Ok(())
}

//! Market Intelligence Service - Library Entry Point
//!
//! The surface callers use: current snapshot, cache reset, diagnostic
//! discovery and the read-side views. Views go through `get_snapshot`,
//! so they rebuild only when the snapshot is stale.

use std::sync::Arc;

use super::aggregation_cache::{AggregationCache, SnapshotResult};
use super::discovery::TableDiscovery;
use super::rebuild::SnapshotRebuilder;
use crate::config::AppConfig;
use crate::domain::classify::TableDescriptor;
use crate::domain::record::NormalizedProcedure;
use crate::domain::territory::TerritoryAggregate;
use crate::domain::views::{self, SearchFilters};
use crate::error::AggregationError;
use crate::ports::clock::Clock;
use crate::ports::observer::CacheObserver;
use crate::ports::table_client::RemoteTableClient;

/// Cached market snapshot plus on-demand discovery.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct MarketIntelService {
  cache: AggregationCache,
  discovery: Arc<TableDiscovery>,
}

impl MarketIntelService {
  pub fn new(cache: AggregationCache, discovery: TableDiscovery) -> Self {
    Self {
      cache,
      discovery: Arc::new(discovery),
    }
  }

  /// Wire the service from configuration around one table client.
  pub fn from_config(
    config: &AppConfig,
    client: Arc<dyn RemoteTableClient>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CacheObserver>,
  ) -> Self {
    let rebuilder = SnapshotRebuilder::new(
      Arc::clone(&client),
      config.sources.clone(),
      config.remote.row_limit,
      Arc::clone(&clock),
      Arc::clone(&observer),
    );
    let cache = AggregationCache::new(rebuilder, config.cache.ttl(), clock, observer);
    let discovery = TableDiscovery::new(client, config.discovery.candidate_tables.clone());
    Self::new(cache, discovery)
  }

  /// The underlying cache, for readiness checks.
  pub const fn cache(&self) -> &AggregationCache {
    &self.cache
  }

  /// Current snapshot, rebuilt first if stale.
  ///
  /// # Errors
  /// `AggregationError` when the rebuild this call awaited failed.
  pub async fn get_snapshot(&self) -> SnapshotResult {
    self.cache.get_snapshot().await
  }

  /// Describe the store's tables. Independent of the cache.
  pub async fn discover_all_tables(&self) -> Vec<TableDescriptor> {
    self.discovery.discover_all().await
  }

  /// Drop the cached snapshot so the next read rebuilds.
  pub async fn clear_cache(&self) {
    self.cache.clear().await;
  }

  /// Procedures matching `query`, narrowed by `filters`.
  ///
  /// # Errors
  /// Propagates `get_snapshot` failures.
  pub async fn search_procedures(
    &self,
    query: &str,
    filters: &SearchFilters,
  ) -> Result<Vec<NormalizedProcedure>, AggregationError> {
    let snapshot = self.get_snapshot().await?;
    Ok(views::search_procedures(&snapshot, query, filters))
  }

  /// Fastest-growing procedures, at most `limit`.
  ///
  /// # Errors
  /// Propagates `get_snapshot` failures.
  pub async fn top_growth_procedures(
    &self,
    limit: usize,
  ) -> Result<Vec<NormalizedProcedure>, AggregationError> {
    let snapshot = self.get_snapshot().await?;
    Ok(views::top_growth_procedures(&snapshot, limit))
  }

  /// Largest territories by market size, at most `limit`.
  ///
  /// # Errors
  /// Propagates `get_snapshot` failures.
  pub async fn top_territories(
    &self,
    limit: usize,
  ) -> Result<Vec<TerritoryAggregate>, AggregationError> {
    let snapshot = self.get_snapshot().await?;
    Ok(views::top_territories(&snapshot, limit))
  }
}

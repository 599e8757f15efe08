//! Snapshot Rebuild - Concurrent Fan-out and Assembly
//!
//! One rebuild:
//! 1. Queries every configured source concurrently
//! 2. Normalizes whatever came back, source by source
//! 3. Derives territories and metrics
//! 4. Seals a new snapshot stamped with the clock
//!
//! A failed source is logged and excluded. The rebuild fails only
//! when every source failed.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::domain::record::SourceSpec;
use crate::domain::snapshot::{AggregationSnapshot, SnapshotAssembler};
use crate::error::AggregationError;
use crate::ports::clock::Clock;
use crate::ports::observer::CacheObserver;
use crate::ports::table_client::{QueryOptions, RemoteTableClient};

/// Builds fresh snapshots from the configured sources.
pub struct SnapshotRebuilder {
  /// Remote table store.
  client: Arc<dyn RemoteTableClient>,
  /// Tables fanned out to on every rebuild.
  sources: Vec<SourceSpec>,
  /// Row limit per source query.
  row_limit: usize,
  /// Time source for snapshot stamps.
  clock: Arc<dyn Clock>,
  /// Telemetry sink.
  observer: Arc<dyn CacheObserver>,
}

impl SnapshotRebuilder {
  /// Create a new rebuilder.
  pub fn new(
    client: Arc<dyn RemoteTableClient>,
    sources: Vec<SourceSpec>,
    row_limit: usize,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CacheObserver>,
  ) -> Self {
    Self {
      client,
      sources,
      row_limit,
      clock,
      observer,
    }
  }

  /// Fetch every source and assemble a new snapshot.
  ///
  /// # Errors
  /// Returns `AggregationError::AllSourcesFailed` if no source answered.
  #[instrument(skip(self), fields(sources = self.sources.len()))]
  pub async fn rebuild(&self) -> Result<AggregationSnapshot, AggregationError> {
    let fetches = self.sources.iter().map(|source| async move {
      let options = source
        .filters
        .iter()
        .fold(QueryOptions::limited(self.row_limit), |options, (column, value)| {
          options.with_filter(column.as_str(), value.as_str())
        });
      (source, self.client.query(&source.table, &options).await)
    });
    let results = join_all(fetches).await;

    let mut assembler = SnapshotAssembler::new();
    let mut failures = Vec::new();

    for (source, result) in results {
      match result {
        Ok(rows) => {
          debug!(table = %source.table, rows = rows.len(), "Source fetched");
          assembler.add_rows(source, &rows);
        }
        Err(err) => {
          warn!(table = %err.table(), error = %err, "Source fetch failed, excluding from rebuild");
          self.observer.source_failed(err.table());
          assembler.add_failure(source, &err);
          failures.push(err.to_string());
        }
      }
    }

    if assembler.succeeded_sources() == 0 {
      return Err(AggregationError::AllSourcesFailed {
        attempted: self.sources.len(),
        failures,
      });
    }

    let (snapshot, notes) = assembler.finish(self.clock.now_millis());

    for dropped in &notes.dropped_rows {
      warn!(error = %dropped, "Dropped unnormalizable row");
    }
    for malformed in &notes.malformed_regional {
      debug!(error = %malformed, "Skipped regional data");
    }

    info!(
      procedures = snapshot.metrics.total_procedures,
      companies = snapshot.metrics.total_companies,
      categories = snapshot.metrics.total_categories,
      territories = snapshot.metrics.territory_count,
      failed_sources = failures.len(),
      "Snapshot rebuilt"
    );

    Ok(snapshot)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::record::{Industry, RawRow, RecordKind};
  use crate::error::{DiscoveryUnavailable, SourceFetchError};
  use crate::ports::clock::ManualClock;
  use crate::ports::observer::NoopObserver;
  use async_trait::async_trait;
  use serde_json::json;

  /// Serves two rows per table, failing the tables it is told to.
  struct Flaky {
    failing: Vec<&'static str>,
  }

  #[async_trait]
  impl RemoteTableClient for Flaky {
    async fn query(&self, table: &str, options: &QueryOptions) -> Result<Vec<RawRow>, SourceFetchError> {
      assert_eq!(options.limit, Some(100));
      if table == "p1" {
        assert_eq!(options.filters, [("active".to_string(), "true".to_string())]);
      } else {
        assert!(options.filters.is_empty());
      }
      if self.failing.iter().any(|f| *f == table) {
        return Err(SourceFetchError::Status {
          table: table.to_string(),
          status: 503,
          body: String::new(),
        });
      }
      Ok(vec![
        json!({ "name": format!("{table}-a"), "market_size": 10, "growth_rate": 2 }),
        json!({ "name": format!("{table}-b"), "market_size": 5, "growth_rate": 4 }),
      ])
    }

    async fn row_count(&self, _: &str) -> Result<u64, SourceFetchError> {
      Ok(2)
    }

    async fn list_tables(&self) -> Result<Vec<String>, DiscoveryUnavailable> {
      Err(DiscoveryUnavailable("n/a".to_string()))
    }
  }

  fn rebuilder(failing: Vec<&'static str>) -> SnapshotRebuilder {
    let sources = ["p1", "p2", "p3"]
      .into_iter()
      .map(|t| SourceSpec::new(t, Industry::Dental, RecordKind::Procedures))
      .map(|s| if s.table == "p1" { s.with_filter("active", "true") } else { s })
      .collect();
    SnapshotRebuilder::new(
      Arc::new(Flaky { failing }),
      sources,
      100,
      Arc::new(ManualClock::new(42)),
      Arc::new(NoopObserver),
    )
  }

  #[tokio::test]
  async fn test_partial_failure_uses_survivors() {
    let snapshot = rebuilder(vec!["p2"]).rebuild().await.unwrap();
    assert_eq!(snapshot.metrics.total_procedures, 4);
    assert!((snapshot.metrics.total_market_size_usd_millions - 30.0).abs() < f64::EPSILON);
    assert_eq!(snapshot.succeeded_sources(), 2);
    assert_eq!(snapshot.fetched_at_epoch_millis, 42);
  }

  #[tokio::test]
  async fn test_all_sources_failed() {
    let err = rebuilder(vec!["p1", "p2", "p3"]).rebuild().await.unwrap_err();
    match err {
      AggregationError::AllSourcesFailed { attempted, failures } => {
        assert_eq!(attempted, 3);
        assert_eq!(failures.len(), 3);
      }
      other => panic!("unexpected error: {other}"),
    }
  }
}

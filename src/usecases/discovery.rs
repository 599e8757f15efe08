//! Table Discovery - Diagnostic Exploration of the Remote Store
//!
//! Lists what the store holds and describes each table: sampled rows,
//! column names, market/geo column flags and a derived kind.
//!
//! Enumeration is tried first. When the store cannot enumerate, the
//! configured candidate tables are probed one at a time and any that
//! error are skipped as absent. Nothing here touches the snapshot cache.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::domain::classify::{TableDescriptor, SAMPLE_ROWS};
use crate::error::SourceFetchError;
use crate::ports::table_client::{QueryOptions, RemoteTableClient};

/// On-demand table explorer.
pub struct TableDiscovery {
  client: Arc<dyn RemoteTableClient>,
  /// Probed in order when enumeration is unavailable.
  candidates: Vec<String>,
}

impl TableDiscovery {
  pub fn new(client: Arc<dyn RemoteTableClient>, candidates: Vec<String>) -> Self {
    Self { client, candidates }
  }

  /// Describe every reachable table.
  ///
  /// Never fails: an unreachable store yields an empty list.
  #[instrument(skip(self))]
  pub async fn discover_all(&self) -> Vec<TableDescriptor> {
    let tables = match self.client.list_tables().await {
      Ok(tables) => {
        debug!(tables = tables.len(), "Store enumerated its tables");
        tables
      }
      Err(err) => {
        debug!(error = %err, candidates = self.candidates.len(), "Enumeration unavailable, probing candidates");
        self.candidates.clone()
      }
    };

    let mut descriptors = Vec::with_capacity(tables.len());
    for table in &tables {
      match self.describe(table).await {
        Ok(descriptor) => descriptors.push(descriptor),
        Err(err) => debug!(table = %table, error = %err, "Table did not respond, skipping"),
      }
    }

    info!(
      listed = tables.len(),
      described = descriptors.len(),
      "Discovery complete"
    );
    descriptors
  }

  /// Sample one table and classify it.
  async fn describe(&self, table: &str) -> Result<TableDescriptor, SourceFetchError> {
    let sample = self
      .client
      .query(table, &QueryOptions::limited(SAMPLE_ROWS))
      .await?;

    let row_count = match self.client.row_count(table).await {
      Ok(count) => Some(count),
      Err(err) => {
        warn!(table, error = %err, "Row count unavailable, using sample size");
        None
      }
    };

    Ok(TableDescriptor::from_sample(table, row_count, sample))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use serde_json::json;

  use crate::domain::record::{RawRow, SourceKind};
  use crate::error::DiscoveryUnavailable;

  /// Knows `procedures` and `regions`; counts fail for `regions`.
  struct Store {
    enumerates: bool,
  }

  #[async_trait]
  impl RemoteTableClient for Store {
    async fn query(&self, table: &str, options: &QueryOptions) -> Result<Vec<RawRow>, SourceFetchError> {
      assert_eq!(options.limit, Some(SAMPLE_ROWS));
      match table {
        "procedures" => Ok(vec![
          json!({ "id": 1, "name": "Implant", "market_size": 10 }),
          json!({ "id": 2, "name": "Veneer", "average_cost_usd": 900 }),
        ]),
        "regions" => Ok(vec![json!({ "territory": "NY" })]),
        other => Err(SourceFetchError::Status {
          table: other.to_string(),
          status: 404,
          body: String::new(),
        }),
      }
    }

    async fn row_count(&self, table: &str) -> Result<u64, SourceFetchError> {
      if table == "regions" {
        return Err(SourceFetchError::Decode {
          table: table.to_string(),
          message: "missing or unparseable Content-Range".to_string(),
        });
      }
      Ok(3_573)
    }

    async fn list_tables(&self) -> Result<Vec<String>, DiscoveryUnavailable> {
      if self.enumerates {
        Ok(vec!["procedures".to_string(), "regions".to_string()])
      } else {
        Err(DiscoveryUnavailable("no enumeration procedure configured".to_string()))
      }
    }
  }

  fn candidates() -> Vec<String> {
    ["companies", "procedures", "missing"]
      .into_iter()
      .map(String::from)
      .collect()
  }

  #[tokio::test]
  async fn test_enumeration_describes_each_table() {
    let discovery = TableDiscovery::new(Arc::new(Store { enumerates: true }), candidates());
    let tables = discovery.discover_all().await;

    assert_eq!(tables.len(), 2);
    let procedures = &tables[0];
    assert_eq!(procedures.name, "procedures");
    assert_eq!(procedures.row_count, 3_573);
    assert_eq!(procedures.column_names, ["id", "name", "market_size", "average_cost_usd"]);
    assert!(procedures.has_market_columns);
    assert_eq!(procedures.kind, SourceKind::Procedures);

    let regions = &tables[1];
    assert_eq!(regions.row_count, 1);
    assert!(regions.has_geo_columns);
    assert_eq!(regions.kind, SourceKind::Geography);
  }

  #[tokio::test]
  async fn test_fallback_skips_missing_candidates() {
    let discovery = TableDiscovery::new(Arc::new(Store { enumerates: false }), candidates());
    let tables = discovery.discover_all().await;

    let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["procedures"]);
  }
}

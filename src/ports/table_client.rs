//! Remote Table Port - Named-Table Query Interface
//!
//! Defines the trait for querying named tables on the remote data store.
//! The subsystem assumes no protocol: it asks for a table by name and
//! gets a row set or a typed failure. No retries at this layer.

use async_trait::async_trait;

use crate::domain::record::RawRow;
use crate::error::{DiscoveryUnavailable, SourceFetchError};

/// Row limit and equality filters for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
  /// Maximum rows to return (`None` = store default).
  pub limit: Option<usize>,
  /// Column equality filters, applied conjunctively.
  pub filters: Vec<(String, String)>,
}

impl QueryOptions {
  /// Options requesting at most `limit` rows.
  pub fn limited(limit: usize) -> Self {
    Self {
      limit: Some(limit),
      filters: Vec::new(),
    }
  }

  /// Add an equality filter.
  #[must_use]
  pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
    self.filters.push((column.into(), value.into()));
    self
  }
}

/// Trait for remote table stores.
///
/// One call is one logical query against one table. Callers issue
/// independent calls per table; a failure for one table never affects
/// another.
#[async_trait]
pub trait RemoteTableClient: Send + Sync + 'static {
  /// Fetch rows from a named table.
  async fn query(
    &self,
    table: &str,
    options: &QueryOptions,
  ) -> Result<Vec<RawRow>, SourceFetchError>;

  /// Exact row count of a table, when the store can report it.
  async fn row_count(&self, table: &str) -> Result<u64, SourceFetchError>;

  /// Enumerate every table the store knows about.
  ///
  /// Stores without an enumeration capability return
  /// `DiscoveryUnavailable`.
  async fn list_tables(&self) -> Result<Vec<String>, DiscoveryUnavailable>;
}

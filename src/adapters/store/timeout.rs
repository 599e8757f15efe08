//! Per-call timeout decorator for any `RemoteTableClient`.
//!
//! A hung source resolves to `SourceFetchError::Timeout` for that
//! table only, so one slow table cannot hold up a rebuild's fan-out.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::record::RawRow;
use crate::error::{DiscoveryUnavailable, SourceFetchError};
use crate::ports::table_client::{QueryOptions, RemoteTableClient};

/// Wraps a client and bounds every call by `timeout`.
pub struct TimeoutTableClient<C> {
  inner: C,
  timeout: Duration,
}

impl<C> TimeoutTableClient<C> {
  pub const fn new(inner: C, timeout: Duration) -> Self {
    Self { inner, timeout }
  }

  fn timed_out(&self, table: &str) -> SourceFetchError {
    SourceFetchError::Timeout {
      table: table.to_string(),
      after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
    }
  }
}

#[async_trait]
impl<C: RemoteTableClient> RemoteTableClient for TimeoutTableClient<C> {
  async fn query(
    &self,
    table: &str,
    options: &QueryOptions,
  ) -> Result<Vec<RawRow>, SourceFetchError> {
    tokio::time::timeout(self.timeout, self.inner.query(table, options))
      .await
      .unwrap_or_else(|_| Err(self.timed_out(table)))
  }

  async fn row_count(&self, table: &str) -> Result<u64, SourceFetchError> {
    tokio::time::timeout(self.timeout, self.inner.row_count(table))
      .await
      .unwrap_or_else(|_| Err(self.timed_out(table)))
  }

  async fn list_tables(&self) -> Result<Vec<String>, DiscoveryUnavailable> {
    tokio::time::timeout(self.timeout, self.inner.list_tables())
      .await
      .unwrap_or_else(|_| Err(DiscoveryUnavailable("table enumeration timed out".to_string())))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use tokio_test::{assert_err, assert_ok};

  struct Hung;

  #[async_trait]
  impl RemoteTableClient for Hung {
    async fn query(&self, table: &str, _: &QueryOptions) -> Result<Vec<RawRow>, SourceFetchError> {
      if table == "slow" {
        tokio::time::sleep(Duration::from_secs(3600)).await;
      }
      Ok(vec![json!({ "name": table })])
    }

    async fn row_count(&self, _: &str) -> Result<u64, SourceFetchError> {
      std::future::pending().await
    }

    async fn list_tables(&self) -> Result<Vec<String>, DiscoveryUnavailable> {
      std::future::pending().await
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_hung_call_becomes_timeout() {
    let client = TimeoutTableClient::new(Hung, Duration::from_millis(250));

    let err = client.query("slow", &QueryOptions::default()).await.unwrap_err();
    assert_eq!(
      err,
      SourceFetchError::Timeout {
        table: "slow".to_string(),
        after_ms: 250,
      }
    );

    let rows = assert_ok!(client.query("fast", &QueryOptions::default()).await);
    assert_eq!(rows.len(), 1);

    assert_err!(client.row_count("slow").await);
    assert_err!(client.list_tables().await);
  }
}

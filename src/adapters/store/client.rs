//! Table Store HTTP Client - Rate-limited REST Table Client
//!
//! Wraps reqwest with concurrency and rate limiting for a
//! PostgREST-style table store. Implements the `RemoteTableClient`
//! port. No retries here: a failed call is a failed source.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::types::{parse_content_range, query_params, table_names, truncate_body};
use crate::config::{DiscoveryConfig, RemoteConfig};
use crate::domain::record::RawRow;
use crate::error::{DiscoveryUnavailable, SourceFetchError};
use crate::ports::table_client::{QueryOptions, RemoteTableClient};

/// Configuration for the table store client.
#[derive(Debug, Clone)]
pub struct StoreClientConfig {
  /// Store base URL; tables live under `/rest/v1/`.
  pub base_url: String,
  /// API key sent as `apikey` and bearer token.
  pub api_key: Option<String>,
  /// Per-request timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Request rate ceiling.
  pub requests_per_second: NonZeroU32,
  /// Store-side procedure that lists tables, if any.
  pub list_tables_rpc: Option<String>,
}

impl Default for StoreClientConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:54321".to_string(),
      api_key: None,
      timeout: Duration::from_secs(10),
      max_concurrent: 8,
      requests_per_second: NonZeroU32::MIN.saturating_add(19),
      list_tables_rpc: None,
    }
  }
}

impl StoreClientConfig {
  /// Build from file configuration, reading the API key from the
  /// environment variable the config names.
  pub fn from_config(remote: &RemoteConfig, discovery: &DiscoveryConfig) -> Self {
    let api_key = std::env::var(&remote.api_key_env).ok();
    if api_key.is_none() {
      warn!(var = %remote.api_key_env, "API key not set, requests will be anonymous");
    }

    Self {
      base_url: remote.base_url.trim_end_matches('/').to_string(),
      api_key,
      timeout: remote.timeout(),
      max_concurrent: remote.max_concurrent,
      requests_per_second: NonZeroU32::new(remote.requests_per_second)
        .unwrap_or(NonZeroU32::MIN),
      list_tables_rpc: discovery.list_tables_rpc.clone(),
    }
  }
}

/// Rate-limited HTTP client for the remote table store.
pub struct StoreClient {
  /// Underlying HTTP client.
  http: Client,
  /// Client configuration.
  config: StoreClientConfig,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
  /// Request rate limiter.
  limiter: DefaultDirectRateLimiter,
}

impl StoreClient {
  /// Create a new store client.
  pub fn new(config: StoreClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
    let limiter = RateLimiter::direct(Quota::per_second(config.requests_per_second));

    Ok(Self {
      http,
      config,
      semaphore,
      limiter,
    })
  }

  fn table_url(&self, table: &str) -> String {
    format!("{}/rest/v1/{}", self.config.base_url, table)
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.config.api_key {
      Some(key) => request.header("apikey", key).bearer_auth(key),
      None => request,
    }
  }

  /// Send a request under the concurrency and rate limits.
  async fn send(&self, table: &str, request: RequestBuilder) -> Result<Response, SourceFetchError> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|e| SourceFetchError::Transport {
        table: table.to_string(),
        message: e.to_string(),
      })?;
    self.limiter.until_ready().await;

    let response = self
      .authorize(request)
      .send()
      .await
      .map_err(|e| self.transport_error(table, &e))?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(table, status = %status, "Table store returned an error");
    Err(SourceFetchError::Status {
      table: table.to_string(),
      status: status.as_u16(),
      body: truncate_body(&body),
    })
  }

  fn transport_error(&self, table: &str, error: &reqwest::Error) -> SourceFetchError {
    if error.is_timeout() {
      SourceFetchError::Timeout {
        table: table.to_string(),
        after_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
      }
    } else {
      SourceFetchError::Transport {
        table: table.to_string(),
        message: error.to_string(),
      }
    }
  }

  /// Check if the store is reachable.
  pub async fn health_check(&self) -> bool {
    self
      .authorize(self.http.get(format!("{}/rest/v1/", self.config.base_url)))
      .send()
      .await
      .is_ok_and(|r| r.status().is_success())
  }
}

#[async_trait]
impl RemoteTableClient for StoreClient {
  async fn query(
    &self,
    table: &str,
    options: &QueryOptions,
  ) -> Result<Vec<RawRow>, SourceFetchError> {
    let request = self
      .http
      .get(self.table_url(table))
      .query(&query_params(options));
    let response = self.send(table, request).await?;

    let rows: Vec<Value> = response
      .json()
      .await
      .map_err(|e| SourceFetchError::Decode {
        table: table.to_string(),
        message: e.to_string(),
      })?;

    debug!(table, rows = rows.len(), "Table fetched");
    Ok(rows)
  }

  async fn row_count(&self, table: &str) -> Result<u64, SourceFetchError> {
    let request = self
      .http
      .head(self.table_url(table))
      .query(&[("select", "*")])
      .header("Prefer", "count=exact");
    let response = self.send(table, request).await?;

    response
      .headers()
      .get("content-range")
      .and_then(|v| v.to_str().ok())
      .and_then(parse_content_range)
      .ok_or_else(|| SourceFetchError::Decode {
        table: table.to_string(),
        message: "missing or unparseable Content-Range".to_string(),
      })
  }

  async fn list_tables(&self) -> Result<Vec<String>, DiscoveryUnavailable> {
    let Some(rpc) = &self.config.list_tables_rpc else {
      return Err(DiscoveryUnavailable(
        "no enumeration procedure configured".to_string(),
      ));
    };

    let request = self
      .http
      .post(format!("{}/rest/v1/rpc/{}", self.config.base_url, rpc))
      .json(&serde_json::json!({}));
    let response = self
      .send(rpc, request)
      .await
      .map_err(|e| DiscoveryUnavailable(e.to_string()))?;

    let rows: Vec<Value> = response
      .json()
      .await
      .map_err(|e| DiscoveryUnavailable(format!("undecodable table list: {e}")))?;

    Ok(table_names(&rows))
  }
}

//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Source tables, the discovery allow-list and the cache TTL are all
//! externalized here - nothing is hardcoded in the usecase layer.
//! Secrets (the remote API key) come from the environment only.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::domain::record::{Industry, RecordKind, SourceSpec};

/// Top-level engine configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the engine begins serving.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Remote table store connection.
  pub remote: RemoteConfig,
  /// Snapshot cache behaviour.
  #[serde(default)]
  pub cache: CacheConfig,
  /// Tables fanned out to on every rebuild.
  #[serde(default = "default_sources")]
  pub sources: Vec<SourceSpec>,
  /// Table discovery settings.
  #[serde(default)]
  pub discovery: DiscoveryConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Remote table store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Store base URL (tables live under `/rest/v1/`).
  pub base_url: String,
  /// Name of the environment variable holding the API key.
  #[serde(default = "default_api_key_env")]
  pub api_key_env: String,
  /// Per-call timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Maximum concurrent requests against the store.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
  /// Request rate ceiling.
  #[serde(default = "default_requests_per_second")]
  pub requests_per_second: u32,
  /// Row limit applied to every rebuild fetch.
  #[serde(default = "default_row_limit")]
  pub row_limit: usize,
}

impl RemoteConfig {
  pub const fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

/// Snapshot cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Freshness window in seconds.
  #[serde(default = "default_ttl_seconds")]
  pub ttl_seconds: u64,
}

impl CacheConfig {
  pub const fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_seconds)
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_seconds: default_ttl_seconds(),
    }
  }
}

/// Table discovery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
  /// Store-side procedure that enumerates tables, if the store has one.
  #[serde(default)]
  pub list_tables_rpc: Option<String>,
  /// Tables probed one at a time when enumeration is unavailable.
  #[serde(default = "default_candidate_tables")]
  pub candidate_tables: Vec<String>,
}

impl Default for DiscoveryConfig {
  fn default() -> Self {
    Self {
      list_tables_rpc: None,
      candidate_tables: default_candidate_tables(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health and API endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_api_key_env() -> String {
  "MARKET_DATA_API_KEY".to_string()
}

fn default_timeout_ms() -> u64 {
  10_000
}

fn default_max_concurrent() -> usize {
  8
}

fn default_requests_per_second() -> u32 {
  20
}

fn default_row_limit() -> usize {
  1_000
}

fn default_ttl_seconds() -> u64 {
  300 // five minutes
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}

/// Rebuild sources used when `config.toml` lists none.
pub fn default_sources() -> Vec<SourceSpec> {
  vec![
    SourceSpec::new("dental_procedures", Industry::Dental, RecordKind::Procedures),
    SourceSpec::new("aesthetic_procedures", Industry::Aesthetic, RecordKind::Procedures),
    SourceSpec::new("dental_companies", Industry::Dental, RecordKind::Companies),
    SourceSpec::new("aesthetic_companies", Industry::Aesthetic, RecordKind::Companies),
    SourceSpec::new(
      "dental_procedure_categories",
      Industry::Dental,
      RecordKind::Categories,
    ),
    SourceSpec::new("aesthetic_categories", Industry::Aesthetic, RecordKind::Categories),
  ]
}

/// Discovery allow-list used when `config.toml` lists none.
///
/// May drift from the live store; kept as configuration on purpose.
pub fn default_candidate_tables() -> Vec<String> {
  [
    "procedures",
    "dental_procedures",
    "aesthetic_procedures",
    "companies",
    "dental_procedure_categories",
    "aesthetic_categories",
    "standardized_procedure_categories",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

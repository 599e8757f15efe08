//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    sources = config.sources.len(),
    candidates = config.discovery.candidate_tables.len(),
    ttl_seconds = config.cache.ttl_seconds,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
///
/// # Errors
/// Returns an error if parsing or validation fails.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - A usable remote endpoint and timeout
/// - At least one rebuild source, with unique table names
/// - A non-zero cache TTL
fn validate_config(config: &AppConfig) -> Result<()> {
  // Remote validation
  anyhow::ensure!(
    !config.remote.base_url.is_empty(),
    "Remote base_url must not be empty"
  );
  anyhow::ensure!(
    config.remote.timeout_ms > 0,
    "Remote timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.remote.max_concurrent > 0,
    "Remote max_concurrent must be positive"
  );
  anyhow::ensure!(
    config.remote.requests_per_second > 0,
    "Remote requests_per_second must be positive"
  );
  anyhow::ensure!(
    config.remote.row_limit > 0,
    "Remote row_limit must be positive"
  );

  // Source validation
  anyhow::ensure!(
    !config.sources.is_empty(),
    "At least one source must be configured"
  );

  let mut seen = HashSet::new();
  for (i, source) in config.sources.iter().enumerate() {
    anyhow::ensure!(!source.table.is_empty(), "Source {} has empty table name", i);
    anyhow::ensure!(
      source.filters.keys().all(|column| !column.is_empty()),
      "Source {} ({}) has a filter with an empty column",
      i,
      source.table
    );
    anyhow::ensure!(
      seen.insert(source.table.as_str()),
      "Source {} ({}) is configured twice",
      i,
      source.table
    );
  }

  // Cache validation
  anyhow::ensure!(
    config.cache.ttl_seconds > 0,
    "Cache ttl_seconds must be positive"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::record::{Industry, RecordKind};

  const MINIMAL: &str = r#"
[service]
name = "market-engine"

[remote]
base_url = "https://store.example.com"
"#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_takes_defaults() {
    let config = parse_config(MINIMAL).unwrap();
    assert_eq!(config.cache.ttl_seconds, 300);
    assert_eq!(config.sources.len(), 6);
    assert_eq!(config.discovery.candidate_tables.len(), 7);
    assert!(config.discovery.list_tables_rpc.is_none());
    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.remote.api_key_env, "MARKET_DATA_API_KEY");
  }

  #[test]
  fn test_explicit_sources() {
    let text = format!(
      "{MINIMAL}\n[cache]\nttl_seconds = 60\n\n[[sources]]\ntable = \"x\"\nindustry = \"aesthetic\"\nkind = \"companies\"\n"
    );
    let config = parse_config(&text).unwrap();
    assert_eq!(config.cache.ttl_seconds, 60);
    assert_eq!(config.sources.len(), 1);
    assert_eq!(config.sources[0].industry, Industry::Aesthetic);
    assert_eq!(config.sources[0].kind, RecordKind::Companies);
    assert!(config.sources[0].filters.is_empty());
  }

  #[test]
  fn test_source_filters() {
    let source = r#"
[[sources]]
table = "x"
industry = "dental"
kind = "procedures"
filters = { active = "true" }
"#;
    let config = parse_config(&format!("{MINIMAL}\n{source}")).unwrap();
    assert_eq!(config.sources[0].filters.get("active").map(String::as_str), Some("true"));
  }

  #[test]
  fn test_duplicate_sources_rejected() {
    let source = "[[sources]]\ntable = \"x\"\nindustry = \"dental\"\nkind = \"procedures\"\n";
    let text = format!("{MINIMAL}\n{source}\n{source}");
    let err = parse_config(&text).unwrap_err();
    assert!(err.to_string().contains("configured twice"));
  }

  #[test]
  fn test_zero_ttl_rejected() {
    let text = format!("{MINIMAL}\n[cache]\nttl_seconds = 0\n");
    assert!(parse_config(&text).is_err());
  }
}

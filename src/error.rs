//! Error Types - Failure Taxonomy for Aggregation and Discovery
//!
//! Source-level and record-level failures are absorbed close to where
//! they happen. Only `AggregationError` ever reaches a caller of the
//! snapshot cache, and only the callers awaiting the failed rebuild.

use thiserror::Error;

/// One named remote table failed to respond.
///
/// Recorded and logged by the rebuild, then excluded from its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceFetchError {
  /// The request never produced a response (connect, TLS, body read).
  #[error("transport error on table {table}: {message}")]
  Transport {
    /// Remote table name.
    table: String,
    /// Underlying transport failure.
    message: String,
  },

  /// The remote store answered with a non-success status.
  #[error("table {table} returned HTTP {status}: {body}")]
  Status {
    /// Remote table name.
    table: String,
    /// HTTP status code.
    status: u16,
    /// Response body, truncated.
    body: String,
  },

  /// The response body was not a row set.
  #[error("table {table} returned an undecodable body: {message}")]
  Decode {
    /// Remote table name.
    table: String,
    /// Decoder message.
    message: String,
  },

  /// The call exceeded the transport timeout.
  #[error("table {table} timed out after {after_ms}ms")]
  Timeout {
    /// Remote table name.
    table: String,
    /// Elapsed budget in milliseconds.
    after_ms: u64,
  },
}

impl SourceFetchError {
  /// Name of the table that failed.
  pub fn table(&self) -> &str {
    match self {
      Self::Transport { table, .. }
      | Self::Status { table, .. }
      | Self::Decode { table, .. }
      | Self::Timeout { table, .. } => table,
    }
  }
}

/// Failure of a whole snapshot rebuild.
///
/// `Clone` because a single rebuild result is delivered to every
/// coalesced caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
  /// Every configured source failed in one rebuild.
  #[error("all sources failed ({attempted} attempted): {}", failures.join("; "))]
  AllSourcesFailed {
    /// Number of sources the rebuild fanned out to.
    attempted: usize,
    /// One message per failed source.
    failures: Vec<String>,
  },

  /// The rebuild task itself died before producing a result.
  #[error("rebuild task aborted: {0}")]
  RebuildAborted(String),
}

/// A record's embedded territory substructure could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed regional data on record {record_id}: {reason}")]
pub struct MalformedRegionalData {
  /// Id of the offending procedure.
  pub record_id: String,
  /// Parser message.
  pub reason: String,
}

/// The remote store cannot enumerate its tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("table enumeration unavailable: {0}")]
pub struct DiscoveryUnavailable(pub String);

/// A raw row could not be normalized at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
  /// The row is not a key/value object.
  #[error("row from {table} is not an object (got {found})")]
  NotAnObject {
    /// Source table.
    table: String,
    /// JSON type that was found instead.
    found: &'static str,
  },
}

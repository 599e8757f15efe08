//! Cache Observer Port - Rebuild and Cache Telemetry Hooks
//!
//! The cache and rebuild usecases report what they do through this
//! trait. Every hook defaults to a no-op so implementors pick what
//! they care about.

use std::time::Duration;

use crate::domain::snapshot::AggregationSnapshot;

/// Receives cache and rebuild events.
pub trait CacheObserver: Send + Sync + 'static {
  /// A read was served from a fresh snapshot.
  fn cache_hit(&self) {}

  /// A read found the cache stale and started a rebuild.
  fn rebuild_started(&self) {}

  /// A read found a rebuild already in flight and joined it.
  fn rebuild_joined(&self) {}

  /// A stale read got the snapshot kept after a failed rebuild.
  fn retained_served(&self) {}

  /// A rebuild completed, successfully or not.
  fn rebuild_finished(&self, _succeeded: bool, _elapsed: Duration) {}

  /// One source failed during a rebuild.
  fn source_failed(&self, _table: &str) {}

  /// A new snapshot replaced the cached one.
  fn snapshot_installed(&self, _snapshot: &AggregationSnapshot) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CacheObserver for NoopObserver {}

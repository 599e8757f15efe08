//! Aggregation Cache - Time-bounded Snapshot with Rebuild Coalescing
//!
//! Owns the single cached snapshot, its freshness and the in-flight
//! rebuild marker. `get_snapshot` is the only read entry point:
//! - Fresh (age < TTL): the cached snapshot is returned immediately.
//! - Stale (age >= TTL, or nothing cached): the first caller starts a
//!   rebuild; every caller arriving while it runs awaits that same
//!   rebuild and receives the same result.
//!
//! The rebuild runs on its own task and is shared as a `Shared` future,
//! so a caller dropping its future never abandons a rebuild others are
//! waiting on. A failed rebuild leaves the cached snapshot untouched
//! and is reported only to the callers that awaited it. Later reads get
//! the retained snapshot straight away while a retry runs in the
//! background, until a rebuild succeeds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::rebuild::SnapshotRebuilder;
use crate::domain::snapshot::AggregationSnapshot;
use crate::error::AggregationError;
use crate::ports::clock::Clock;
use crate::ports::observer::CacheObserver;

/// Result every coalesced caller receives from one rebuild.
pub type SnapshotResult = Result<Arc<AggregationSnapshot>, AggregationError>;

type RebuildFuture = Shared<BoxFuture<'static, SnapshotResult>>;

/// Mutable cache state. Only ever touched under the lock.
#[derive(Default)]
struct CacheState {
  /// Last successfully built snapshot.
  snapshot: Option<Arc<AggregationSnapshot>>,
  /// Rebuild currently running, if any.
  in_flight: Option<RebuildFuture>,
  /// Bumped by `clear`; a rebuild started under an older epoch does
  /// not install its result.
  epoch: u64,
  /// Whether the last rebuild of this epoch failed.
  last_failed: bool,
}

struct CacheInner {
  state: Mutex<CacheState>,
  rebuilder: SnapshotRebuilder,
  clock: Arc<dyn Clock>,
  ttl_millis: u64,
  observer: Arc<dyn CacheObserver>,
}

/// Snapshot cache with lazy, coalesced rebuilds.
///
/// Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct AggregationCache {
  inner: Arc<CacheInner>,
}

impl AggregationCache {
  /// Create an empty cache. The first read triggers a rebuild.
  pub fn new(
    rebuilder: SnapshotRebuilder,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CacheObserver>,
  ) -> Self {
    Self {
      inner: Arc::new(CacheInner {
        state: Mutex::new(CacheState::default()),
        rebuilder,
        clock,
        ttl_millis: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        observer,
      }),
    }
  }

  /// Freshness window.
  pub fn ttl(&self) -> Duration {
    Duration::from_millis(self.inner.ttl_millis)
  }

  /// Current snapshot, rebuilding first if stale.
  ///
  /// After a failed rebuild, a stale snapshot is still returned as is
  /// and a retry starts in the background if none is running.
  ///
  /// # Errors
  /// Returns the rebuild's `AggregationError` if this call awaited a
  /// rebuild that failed. The previously cached snapshot is kept.
  pub async fn get_snapshot(&self) -> SnapshotResult {
    let rebuild = {
      let mut state = self.inner.state.lock().await;

      if let Some(snapshot) = self.inner.fresh(&state) {
        self.inner.observer.cache_hit();
        return Ok(snapshot);
      }

      if let Some(retained) = state.snapshot.clone().filter(|_| state.last_failed) {
        self.inner.observer.retained_served();
        if state.in_flight.is_none() {
          // The spawned task runs to completion without this handle.
          drop(Arc::clone(&self.inner).start_rebuild(&mut state));
        }
        return Ok(retained);
      }

      if let Some(rebuild) = state.in_flight.clone() {
        self.inner.observer.rebuild_joined();
        rebuild
      } else {
        self.inner.observer.rebuild_started();
        Arc::clone(&self.inner).start_rebuild(&mut state)
      }
    };

    rebuild.await
  }

  /// Cached snapshot regardless of age, without rebuilding.
  pub async fn peek(&self) -> Option<Arc<AggregationSnapshot>> {
    self.inner.state.lock().await.snapshot.clone()
  }

  /// Whether any snapshot is held.
  pub async fn has_snapshot(&self) -> bool {
    self.inner.state.lock().await.snapshot.is_some()
  }

  /// Discard the cached snapshot; the next read rebuilds.
  ///
  /// A rebuild already in flight still answers its own callers but
  /// does not install its result.
  pub async fn clear(&self) {
    let mut state = self.inner.state.lock().await;
    state.snapshot = None;
    state.in_flight = None;
    state.last_failed = false;
    state.epoch += 1;
    info!(epoch = state.epoch, "Snapshot cache cleared");
  }
}

impl CacheInner {
  fn fresh(&self, state: &CacheState) -> Option<Arc<AggregationSnapshot>> {
    let snapshot = state.snapshot.as_ref()?;
    let age = snapshot.age_millis(self.clock.now_millis());
    (age < self.ttl_millis).then(|| Arc::clone(snapshot))
  }

  /// Spawn a rebuild and register it as in flight. Caller holds the lock.
  fn start_rebuild(self: Arc<Self>, state: &mut CacheState) -> RebuildFuture {
    let epoch = state.epoch;
    debug!(epoch, "Snapshot stale, starting rebuild");

    let task = tokio::spawn(async move { self.run_rebuild(epoch).await });
    let rebuild = async move {
      task
        .await
        .unwrap_or_else(|e| Err(AggregationError::RebuildAborted(e.to_string())))
    }
    .boxed()
    .shared();

    state.in_flight = Some(rebuild.clone());
    rebuild
  }

  async fn run_rebuild(&self, epoch: u64) -> SnapshotResult {
    let started = Instant::now();
    let result = self.rebuilder.rebuild().await.map(Arc::new);
    let elapsed = started.elapsed();

    let mut state = self.state.lock().await;
    if state.epoch == epoch {
      state.in_flight = None;
      state.last_failed = result.is_err();
      match &result {
        Ok(snapshot) => {
          state.snapshot = Some(Arc::clone(snapshot));
          self.observer.snapshot_installed(snapshot);
        }
        Err(err) => {
          warn!(
            error = %err,
            retained = state.snapshot.is_some(),
            "Rebuild failed, keeping cached snapshot"
          );
        }
      }
    } else {
      debug!(epoch, current = state.epoch, "Cache cleared during rebuild, result not installed");
    }
    drop(state);

    self.observer.rebuild_finished(result.is_ok(), elapsed);
    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

  use async_trait::async_trait;
  use serde_json::json;

  use crate::domain::record::{Industry, RawRow, RecordKind, SourceSpec};
  use crate::error::{DiscoveryUnavailable, SourceFetchError};
  use crate::ports::clock::ManualClock;
  use crate::ports::observer::NoopObserver;
  use crate::ports::table_client::{QueryOptions, RemoteTableClient};

  const TTL_MS: u64 = 300_000;

  /// Counts queries; fails every table while `down` is set.
  #[derive(Default)]
  struct Counting {
    calls: AtomicUsize,
    down: AtomicBool,
  }

  #[async_trait]
  impl RemoteTableClient for Counting {
    async fn query(&self, table: &str, _: &QueryOptions) -> Result<Vec<RawRow>, SourceFetchError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.down.load(Ordering::SeqCst) {
        return Err(SourceFetchError::Transport {
          table: table.to_string(),
          message: "connection refused".to_string(),
        });
      }
      Ok(vec![json!({ "name": "Implant", "market_size": 10 })])
    }

    async fn row_count(&self, _: &str) -> Result<u64, SourceFetchError> {
      Ok(1)
    }

    async fn list_tables(&self) -> Result<Vec<String>, DiscoveryUnavailable> {
      Err(DiscoveryUnavailable("n/a".to_string()))
    }
  }

  fn cache(client: Arc<Counting>, clock: Arc<ManualClock>) -> AggregationCache {
    let rebuilder = SnapshotRebuilder::new(
      client,
      vec![SourceSpec::new("dental_procedures", Industry::Dental, RecordKind::Procedures)],
      1_000,
      clock.clone(),
      Arc::new(NoopObserver),
    );
    AggregationCache::new(
      rebuilder,
      Duration::from_millis(TTL_MS),
      clock,
      Arc::new(NoopObserver),
    )
  }

  #[tokio::test]
  async fn test_ttl_boundary() {
    let client = Arc::new(Counting::default());
    let clock = Arc::new(ManualClock::new(1_000));
    let cache = cache(client.clone(), clock.clone());

    let first = cache.get_snapshot().await.unwrap();
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    clock.set(1_000 + TTL_MS - 1);
    let same = cache.get_snapshot().await.unwrap();
    assert!(Arc::ptr_eq(&first, &same));
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    clock.set(1_000 + TTL_MS);
    let rebuilt = cache.get_snapshot().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &rebuilt));
    assert_eq!(rebuilt.fetched_at_epoch_millis, 1_000 + TTL_MS);
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failed_rebuild_keeps_previous_snapshot() {
    let client = Arc::new(Counting::default());
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache(client.clone(), clock.clone());

    let good = cache.get_snapshot().await.unwrap();

    clock.advance(TTL_MS);
    client.down.store(true, Ordering::SeqCst);
    let err = cache.get_snapshot().await.unwrap_err();
    assert!(matches!(err, AggregationError::AllSourcesFailed { attempted: 1, .. }));

    let retained = cache.peek().await.unwrap();
    assert!(Arc::ptr_eq(&good, &retained));
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);

    // Later reads get the retained snapshot while a retry runs behind them.
    let served = cache.get_snapshot().await.unwrap();
    assert!(Arc::ptr_eq(&good, &served));
    while client.calls.load(Ordering::SeqCst) < 3 {
      tokio::task::yield_now().await;
    }

    // Sources recover: the retry triggered by the next read installs.
    client.down.store(false, Ordering::SeqCst);
    let served = cache.get_snapshot().await.unwrap();
    assert!(Arc::ptr_eq(&good, &served));
    let fresh = loop {
      match cache.peek().await {
        Some(current) if !Arc::ptr_eq(&good, &current) => break current,
        _ => tokio::task::yield_now().await,
      }
    };
    assert_eq!(client.calls.load(Ordering::SeqCst), 4);

    let read = cache.get_snapshot().await.unwrap();
    assert!(Arc::ptr_eq(&fresh, &read));
    assert_eq!(client.calls.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn test_clear_after_failure_rebuilds_on_read() {
    let client = Arc::new(Counting::default());
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache(client.clone(), clock.clone());

    cache.get_snapshot().await.unwrap();
    clock.advance(TTL_MS);
    client.down.store(true, Ordering::SeqCst);
    assert!(cache.get_snapshot().await.is_err());

    cache.clear().await;
    client.down.store(false, Ordering::SeqCst);
    let rebuilt = cache.get_snapshot().await.unwrap();
    assert_eq!(rebuilt.fetched_at_epoch_millis, TTL_MS);
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_clear_forces_rebuild() {
    let client = Arc::new(Counting::default());
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache(client.clone(), clock);

    cache.get_snapshot().await.unwrap();
    assert!(cache.has_snapshot().await);

    cache.clear().await;
    assert!(!cache.has_snapshot().await);

    cache.get_snapshot().await.unwrap();
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_first_read_failure_leaves_cache_empty() {
    let client = Arc::new(Counting::default());
    client.down.store(true, Ordering::SeqCst);
    let cache = cache(client, Arc::new(ManualClock::new(0)));

    assert!(cache.get_snapshot().await.is_err());
    assert!(cache.peek().await.is_none());
    assert_eq!(cache.ttl(), Duration::from_millis(TTL_MS));
  }
}

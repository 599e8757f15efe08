//! Clock Port - Wall-Clock Time Source
//!
//! Cache freshness is judged against this trait rather than the system
//! clock directly, so the TTL boundary can be exercised exactly.

use std::sync::atomic::{AtomicU64, Ordering};

/// Millisecond wall-clock source.
pub trait Clock: Send + Sync + 'static {
  /// Milliseconds since the Unix epoch.
  fn now_millis(&self) -> u64;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_millis(&self) -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
  }
}

/// Manually advanced clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
  now: AtomicU64,
}

impl ManualClock {
  pub const fn new(start_millis: u64) -> Self {
    Self {
      now: AtomicU64::new(start_millis),
    }
  }

  pub fn set(&self, millis: u64) {
    self.now.store(millis, Ordering::SeqCst);
  }

  pub fn advance(&self, millis: u64) {
    self.now.fetch_add(millis, Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now_millis(&self) -> u64 {
    self.now.load(Ordering::SeqCst)
  }
}

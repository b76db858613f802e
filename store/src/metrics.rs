use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the store.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Lookups ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) loads: CachePadded<AtomicU64>,
  pub(crate) load_failures: CachePadded<AtomicU64>,
  pub(crate) absent: CachePadded<AtomicU64>,
  pub(crate) dedup_waits: CachePadded<AtomicU64>,

  // --- Cell Lifecycle ---
  pub(crate) cells_created: CachePadded<AtomicU64>,
  pub(crate) stale_purged: CachePadded<AtomicU64>,

  // --- Update Feed ---
  pub(crate) updates_received: CachePadded<AtomicU64>,
  pub(crate) updates_applied: CachePadded<AtomicU64>,
  pub(crate) updates_ignored: CachePadded<AtomicU64>,
  pub(crate) updates_deferred: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      loads: CachePadded::new(AtomicU64::new(0)),
      load_failures: CachePadded::new(AtomicU64::new(0)),
      absent: CachePadded::new(AtomicU64::new(0)),
      dedup_waits: CachePadded::new(AtomicU64::new(0)),
      cells_created: CachePadded::new(AtomicU64::new(0)),
      stale_purged: CachePadded::new(AtomicU64::new(0)),
      updates_received: CachePadded::new(AtomicU64::new(0)),
      updates_applied: CachePadded::new(AtomicU64::new(0)),
      updates_ignored: CachePadded::new(AtomicU64::new(0)),
      updates_deferred: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      loads: self.loads.load(Ordering::Relaxed),
      load_failures: self.load_failures.load(Ordering::Relaxed),
      absent: self.absent.load(Ordering::Relaxed),
      dedup_waits: self.dedup_waits.load(Ordering::Relaxed),
      cells_created: self.cells_created.load(Ordering::Relaxed),
      stale_purged: self.stale_purged.load(Ordering::Relaxed),
      updates_received: self.updates_received.load(Ordering::Relaxed),
      updates_applied: self.updates_applied.load(Ordering::Relaxed),
      updates_ignored: self.updates_ignored.load(Ordering::Relaxed),
      updates_deferred: self.updates_deferred.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the store's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Lookups answered by a live cell.
  pub hits: u64,
  /// Lookups that found no live cell and no in-flight load.
  pub misses: u64,
  /// The cache hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// Calls made to the data source's lookup.
  pub loads: u64,
  /// Data source lookups that failed.
  pub load_failures: u64,
  /// Data source lookups that found no record.
  pub absent: u64,
  /// Lookups that parked on another caller's in-flight load.
  pub dedup_waits: u64,
  /// Cells created by the store.
  pub cells_created: u64,
  /// Map entries dropped because their cell had been deallocated.
  pub stale_purged: u64,
  /// Events received from the update feed.
  pub updates_received: u64,
  /// Events written into a live cell.
  pub updates_applied: u64,
  /// Events for keys without a live cell, plus removals of live cells.
  pub updates_ignored: u64,
  /// Events recorded on an in-flight load and applied when it finished.
  pub updates_deferred: u64,
  /// The number of seconds the store has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("loads", &self.loads)
      .field("load_failures", &self.load_failures)
      .field("absent", &self.absent)
      .field("dedup_waits", &self.dedup_waits)
      .field("cells_created", &self.cells_created)
      .field("stale_purged", &self.stale_purged)
      .field("updates_received", &self.updates_received)
      .field("updates_applied", &self.updates_applied)
      .field("updates_ignored", &self.updates_ignored)
      .field("updates_deferred", &self.updates_deferred)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}

use crate::loader::LoadFuture;
use crate::metrics::Metrics;
use crate::source::{DataSource, Update};
use crate::store::{CellMap, LoadOutcome, Lookup, Route};

use std::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;

use futures_util::future::AbortHandle;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

/// The internal, thread-safe core of the store.
pub(crate) struct StoreShared<S: DataSource, H> {
  pub(crate) source: S,
  /// The store's single serialization domain. Held only for map access, never
  /// across a data source call or a cell publish.
  pub(crate) cells: Mutex<CellMap<S, H>>,
  pub(crate) metrics: Metrics,
  feed: AbortHandle,
}

impl<S: DataSource, H> fmt::Debug for StoreShared<S, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StoreShared")
      .field("cells", &*self.cells.lock())
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<S: DataSource, H> Drop for StoreShared<S, H> {
  fn drop(&mut self) {
    self.feed.abort();
    debug!("store dropped, stopping update feed");
  }
}

/// Releases an in-flight marker if the lookup unwinds before completing it.
struct AbandonGuard<'a, S: DataSource, H: BuildHasher> {
  shared: &'a StoreShared<S, H>,
  key: &'a S::Key,
  load: &'a LoadFuture<LoadOutcome<S>>,
  armed: bool,
}

impl<'a, S: DataSource, H: BuildHasher> Drop for AbandonGuard<'a, S, H> {
  fn drop(&mut self) {
    if self.armed {
      self.shared.cells.lock().abandon_load(self.key);
      self.load.abandon();
      warn!(key = ?self.key, "lookup unwound, releasing waiters");
    }
  }
}

impl<S, H> StoreShared<S, H>
where
  S: DataSource,
  H: BuildHasher,
{
  pub(crate) fn new(source: S, cells: CellMap<S, H>, feed: AbortHandle) -> Self {
    Self {
      source,
      cells: Mutex::new(cells),
      metrics: Metrics::new(),
      feed,
    }
  }

  /// Resolves `key` to its shared cell, loading it at most once at a time.
  pub(crate) fn load(&self, key: &S::Key) -> LoadOutcome<S> {
    loop {
      let lookup = self.cells.lock().lookup(key, &self.metrics);
      match lookup {
        Lookup::Hit(cell) => {
          Metrics::incr(&self.metrics.hits);
          trace!(key = ?key, "cache hit");
          return Ok(Some(cell));
        }
        Lookup::Pending(load) => {
          Metrics::incr(&self.metrics.dedup_waits);
          debug!(key = ?key, "waiting on in-flight lookup");
          match load.wait() {
            Some(outcome) => return outcome,
            // The loading caller unwound; start over.
            None => continue,
          }
        }
        Lookup::Started(load) => {
          Metrics::incr(&self.metrics.misses);
          return self.fetch(key, &load);
        }
      }
    }
  }

  fn fetch(&self, key: &S::Key, load: &LoadFuture<LoadOutcome<S>>) -> LoadOutcome<S> {
    let mut guard = AbandonGuard {
      shared: self,
      key,
      load,
      armed: true,
    };

    Metrics::incr(&self.metrics.loads);
    debug!(key = ?key, "loading from data source");
    let fetched = self.source.value(key);

    let outcome = self.cells.lock().finish_load(key, fetched, &self.metrics);
    guard.armed = false;
    load.complete(outcome.clone());
    outcome
  }

  /// Applies one feed event to the live cell for its key, if there is one.
  pub(crate) fn route(&self, update: Update<S::Key, S::Value>) {
    Metrics::incr(&self.metrics.updates_received);
    let Update { key, value } = update;

    let route = self.cells.lock().route(&key, value, &self.metrics);
    match route {
      Route::Deliver(cell, value) => {
        cell.set(value);
        Metrics::incr(&self.metrics.updates_applied);
        trace!(key = ?key, "update applied");
      }
      Route::LiveRemoval => {
        Metrics::incr(&self.metrics.updates_ignored);
        debug!(key = ?key, "removal for a live cell ignored, keeping last value");
      }
      Route::Deferred => {
        Metrics::incr(&self.metrics.updates_deferred);
        trace!(key = ?key, "update deferred to in-flight lookup");
      }
      Route::NoCell => {
        Metrics::incr(&self.metrics.updates_ignored);
        trace!(key = ?key, "no live cell for update");
      }
    }
  }
}

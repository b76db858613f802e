use crate::cell::CurrentValueObserved;
use crate::error::LookupFailure;
use crate::loader::LoadFuture;
use crate::metrics::Metrics;
use crate::source::DataSource;

use core::fmt;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::{Arc, Weak};

use tracing::{debug, trace, warn};

/// What a finished lookup hands to its caller and to every parked waiter.
pub(crate) type LoadOutcome<S> = Result<
  Option<Arc<CurrentValueObserved<<S as DataSource>::Value>>>,
  LookupFailure<<S as DataSource>::Error>,
>;

pub(crate) type SharedLoad<S> = Arc<LoadFuture<LoadOutcome<S>>>;

pub(crate) struct InFlight<S: DataSource> {
  load: SharedLoad<S>,
  /// The newest feed event for the key that arrived while loading.
  deferred: Option<Option<S::Value>>,
}

pub(crate) enum CellEntry<S: DataSource> {
  Live(Weak<CurrentValueObserved<S::Value>>),
  Loading(InFlight<S>),
}

/// The result of resolving a key against the map.
pub(crate) enum Lookup<S: DataSource> {
  Hit(Arc<CurrentValueObserved<S::Value>>),
  /// Another caller is already loading this key.
  Pending(SharedLoad<S>),
  /// The caller now owns the in-flight marker and must perform the lookup.
  Started(SharedLoad<S>),
}

/// Where an update event ended up.
pub(crate) enum Route<V> {
  Deliver(Arc<CurrentValueObserved<V>>, V),
  LiveRemoval,
  Deferred,
  NoCell,
}

/// The identity map: each key maps to a weak cell or an in-flight lookup.
///
/// Every method is called with the store's map lock held. Stale weak entries
/// are purged only when an operation touches their key.
pub(crate) struct CellMap<S: DataSource, H> {
  entries: HashMap<S::Key, CellEntry<S>, H>,
}

impl<S: DataSource, H> fmt::Debug for CellMap<S, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CellMap")
      .field("entries", &self.entries.len())
      .finish()
  }
}

impl<S, H> CellMap<S, H>
where
  S: DataSource,
  H: BuildHasher,
{
  pub(crate) fn with_capacity_and_hasher(capacity: usize, hasher: H) -> Self {
    Self {
      entries: HashMap::with_capacity_and_hasher(capacity, hasher),
    }
  }

  /// Returns the live cell for `key`, the in-flight load for it, or installs
  /// a fresh in-flight marker for the caller to complete.
  pub(crate) fn lookup(&mut self, key: &S::Key, metrics: &Metrics) -> Lookup<S> {
    match self.entries.get(key) {
      Some(CellEntry::Live(weak)) => {
        if let Some(cell) = weak.upgrade() {
          return Lookup::Hit(cell);
        }
        // The marker inserted below overwrites the stale entry.
        Metrics::incr(&metrics.stale_purged);
        trace!(key = ?key, "purging stale entry");
      }
      Some(CellEntry::Loading(in_flight)) => return Lookup::Pending(in_flight.load.clone()),
      None => {}
    }

    let load = Arc::new(LoadFuture::new());
    self.entries.insert(
      key.clone(),
      CellEntry::Loading(InFlight {
        load: load.clone(),
        deferred: None,
      }),
    );
    Lookup::Started(load)
  }

  /// Replaces the in-flight marker for `key` with the result of its lookup.
  ///
  /// An update that arrived during the lookup is newer than what the lookup
  /// returned, so it wins.
  pub(crate) fn finish_load(
    &mut self,
    key: &S::Key,
    fetched: Result<Option<S::Value>, S::Error>,
    metrics: &Metrics,
  ) -> LoadOutcome<S> {
    let deferred = match self.entries.remove(key) {
      Some(CellEntry::Loading(in_flight)) => in_flight.deferred,
      _ => None,
    };

    let found = match fetched {
      Ok(found) => found,
      Err(err) => {
        Metrics::incr(&metrics.load_failures);
        warn!(key = ?key, error = %err, "data source lookup failed");
        return Err(LookupFailure::new(err));
      }
    };

    match deferred.unwrap_or(found) {
      Some(value) => {
        let cell = CurrentValueObserved::new(value);
        self
          .entries
          .insert(key.clone(), CellEntry::Live(Arc::downgrade(&cell)));
        Metrics::incr(&metrics.cells_created);
        debug!(key = ?key, "created cell");
        Ok(Some(cell))
      }
      None => {
        Metrics::incr(&metrics.absent);
        debug!(key = ?key, "no record for key");
        Ok(None)
      }
    }
  }

  /// Drops the in-flight marker for `key` without a result.
  pub(crate) fn abandon_load(&mut self, key: &S::Key) {
    if let Some(CellEntry::Loading(_)) = self.entries.get(key) {
      self.entries.remove(key);
    }
  }

  /// Resolves the target of an update event. Never creates an entry.
  pub(crate) fn route(
    &mut self,
    key: &S::Key,
    value: Option<S::Value>,
    metrics: &Metrics,
  ) -> Route<S::Value> {
    let live = match self.entries.get_mut(key) {
      Some(CellEntry::Live(weak)) => weak.upgrade(),
      Some(CellEntry::Loading(in_flight)) => {
        in_flight.deferred = Some(value);
        return Route::Deferred;
      }
      None => return Route::NoCell,
    };

    match (live, value) {
      (Some(cell), Some(value)) => Route::Deliver(cell, value),
      (Some(_), None) => Route::LiveRemoval,
      (None, _) => {
        self.entries.remove(key);
        Metrics::incr(&metrics.stale_purged);
        trace!(key = ?key, "purging stale entry");
        Route::NoCell
      }
    }
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }
}

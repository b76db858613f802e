use crate::builder::StoreBuilder;
use crate::cell::Observed;
use crate::error::LookupFailure;
use crate::metrics::MetricsSnapshot;
use crate::shared::StoreShared;
use crate::source::DataSource;

use std::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;

/// A concurrent, identity-keyed cache of live cells.
///
/// At most one cell per key is alive at a time, and every caller asking for
/// that key while it is alive gets the same cell. The store holds cells only
/// weakly: once the last outside handle is dropped the cell is gone, and the
/// next lookup for its key goes back to the data source.
///
/// Cloning a `Store` yields another handle to the same cache. The update feed
/// stops when the last handle is dropped.
pub struct Store<S: DataSource, H = ahash::RandomState> {
  pub(crate) shared: Arc<StoreShared<S, H>>,
}

impl<S: DataSource, H> Clone for Store<S, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<S: DataSource, H> fmt::Debug for Store<S, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Store")
      .field("shared", &self.shared)
      .finish()
  }
}

impl<S: DataSource> Store<S> {
  /// Starts building a store over `source`.
  pub fn builder(source: S) -> StoreBuilder<S> {
    StoreBuilder::new(source)
  }
}

impl<S, H> Store<S, H>
where
  S: DataSource,
  H: BuildHasher + Send + Sync + 'static,
{
  /// Returns the shared cell for `key`.
  ///
  /// A live cell is returned as is. Otherwise the data source is asked, and
  /// concurrent callers for the same key wait for that one lookup instead of
  /// issuing their own. Returns `Ok(None)` if the data source has no record;
  /// absence is not cached.
  pub fn value(&self, key: &S::Key) -> Result<Option<Observed<S::Value>>, LookupFailure<S::Error>> {
    let cell = self.shared.load(key)?;
    Ok(cell.map(Observed::from_cell))
  }

  /// Returns one array-valued cell over the records for `keys`, in order.
  ///
  /// Keys without a record are left out of the array. The array tracks
  /// changes of the records it was built with; a record created later under
  /// a skipped key does not appear in it.
  pub fn values<'a, I>(&self, keys: I) -> Result<Observed<Vec<S::Value>>, LookupFailure<S::Error>>
  where
    I: IntoIterator<Item = &'a S::Key>,
  {
    let mut present = Vec::new();
    for key in keys {
      if let Some(cell) = self.shared.load(key)? {
        present.push(Observed::from_cell(cell));
      }
    }
    Ok(Observed::combine(present))
  }

  /// Returns a point-in-time snapshot of the store's metrics.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// Returns the data source this store reads through.
  pub fn data_source(&self) -> &S {
    &self.shared.source
  }
}

use crate::error::BuildError;
use crate::handles::Store;
use crate::runtime::{TaskSpawner, ThreadSpawner};
use crate::shared::StoreShared;
use crate::source::DataSource;
use crate::store::CellMap;
use crate::task::feed;

use core::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;

use futures_util::future::AbortHandle;

const DEFAULT_FEED_THREAD_NAME: &str = "fibre-store-feed";

/// A builder for creating `Store` instances.
pub struct StoreBuilder<S: DataSource, H = ahash::RandomState> {
  source: S,
  hasher: H,
  initial_capacity: usize,
  spawner: Option<Arc<dyn TaskSpawner>>,
  feed_thread_name: String,
}

impl<S: DataSource, H> fmt::Debug for StoreBuilder<S, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StoreBuilder")
      .field("initial_capacity", &self.initial_capacity)
      .field("has_spawner", &self.spawner.is_some())
      .field("feed_thread_name", &self.feed_thread_name)
      .finish_non_exhaustive()
  }
}

impl<S: DataSource> StoreBuilder<S> {
  /// Creates a new `StoreBuilder` with default settings.
  pub fn new(source: S) -> Self {
    Self {
      source,
      hasher: ahash::RandomState::new(),
      initial_capacity: 0,
      spawner: None,
      feed_thread_name: DEFAULT_FEED_THREAD_NAME.to_string(),
    }
  }
}

impl<S: DataSource, H> StoreBuilder<S, H> {
  /// Sets the hasher for the store's identity map.
  pub fn hasher<H2>(self, hasher: H2) -> StoreBuilder<S, H2> {
    StoreBuilder {
      source: self.source,
      hasher,
      initial_capacity: self.initial_capacity,
      spawner: self.spawner,
      feed_thread_name: self.feed_thread_name,
    }
  }

  /// Pre-sizes the identity map.
  pub fn initial_capacity(mut self, capacity: usize) -> Self {
    self.initial_capacity = capacity;
    self
  }

  /// Runs the update feed worker on `spawner` instead of a dedicated thread.
  pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }

  /// Names the dedicated feed thread used when no spawner is set.
  ///
  /// Defaults to `fibre-store-feed`.
  pub fn feed_thread_name(mut self, name: impl Into<String>) -> Self {
    self.feed_thread_name = name.into();
    self
  }
}

impl<S, H> StoreBuilder<S, H>
where
  S: DataSource,
  H: BuildHasher + Send + Sync + 'static,
{
  /// Builds the store, subscribing to the data source's update feed.
  pub fn build(self) -> Result<Store<S, H>, BuildError> {
    self.validate()?;

    let updates = self.source.updates();
    let (feed_handle, registration) = AbortHandle::new_pair();
    let cells = CellMap::with_capacity_and_hasher(self.initial_capacity, self.hasher);
    let shared = Arc::new(StoreShared::new(self.source, cells, feed_handle));

    let spawner: Arc<dyn TaskSpawner> = match self.spawner {
      Some(spawner) => spawner,
      None => Arc::new(ThreadSpawner::named(self.feed_thread_name)),
    };
    feed::spawn(Arc::downgrade(&shared), updates, registration, spawner.as_ref());

    Ok(Store { shared })
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.feed_thread_name.contains('\0') {
      return Err(BuildError::InvalidThreadName);
    }
    Ok(())
  }
}

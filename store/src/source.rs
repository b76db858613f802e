use std::fmt;
use std::hash::Hash;

use futures_util::stream::BoxStream;

/// A change event delivered by a data source's update feed.
///
/// `value` is `None` when the record behind `key` no longer exists.
#[derive(Clone, PartialEq, Eq)]
pub struct Update<K, V> {
  pub key: K,
  pub value: Option<V>,
}

impl<K, V> Update<K, V> {
  /// An event carrying the new state of the record behind `key`.
  pub fn upsert(key: K, value: V) -> Self {
    Self {
      key,
      value: Some(value),
    }
  }

  /// An event reporting that the record behind `key` is gone.
  pub fn removal(key: K) -> Self {
    Self { key, value: None }
  }
}

impl<K: fmt::Debug, V> fmt::Debug for Update<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Update")
      .field("key", &self.key)
      .field("present", &self.value.is_some())
      .finish()
  }
}

/// The change feed of a data source. It is expected to be infinite; the
/// store's feed worker stops if it ends.
pub type UpdateStream<K, V> = BoxStream<'static, Update<K, V>>;

/// The external collaborator a `Store` reads through.
///
/// The store calls `updates` exactly once, when it is built, and keeps
/// draining that stream for its whole lifetime. Events may arrive for any key
/// at any time, including keys that were never looked up.
pub trait DataSource: Send + Sync + 'static {
  /// The identity key of a record.
  type Key: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static;
  /// The record itself.
  type Value: Clone + Send + Sync + 'static;
  /// The error a lookup may fail with.
  type Error: std::error::Error + Send + Sync + 'static;

  /// Looks up the current record for `key`. `Ok(None)` means no such record.
  fn value(&self, key: &Self::Key) -> Result<Option<Self::Value>, Self::Error>;

  /// Returns the change feed.
  fn updates(&self) -> UpdateStream<Self::Key, Self::Value>;
}

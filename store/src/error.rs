use std::sync::Arc;

use thiserror::Error;

/// The data source failed while resolving a key.
///
/// A failed lookup leaves no trace in the store, so calling `value` again for
/// the same key issues a fresh lookup. Callers that were parked on the same
/// in-flight lookup all receive a clone of this error.
#[derive(Debug, Error)]
#[error("data source lookup failed: {source}")]
pub struct LookupFailure<E>
where
  E: std::error::Error + 'static,
{
  source: Arc<E>,
}

impl<E> LookupFailure<E>
where
  E: std::error::Error + 'static,
{
  pub(crate) fn new(error: E) -> Self {
    Self {
      source: Arc::new(error),
    }
  }

  /// Returns the error reported by the data source.
  pub fn source_error(&self) -> &E {
    &self.source
  }

  /// Returns the shared handle to the data source's error.
  pub fn into_shared(self) -> Arc<E> {
    self.source
  }
}

impl<E> Clone for LookupFailure<E>
where
  E: std::error::Error + 'static,
{
  fn clone(&self) -> Self {
    Self {
      source: self.source.clone(),
    }
  }
}

/// Errors that can occur when building a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The feed thread name contained a NUL byte, which OS thread names cannot
  /// carry.
  #[error("feed thread name must not contain NUL bytes")]
  InvalidThreadName,
}

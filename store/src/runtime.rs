use std::{future::Future, pin::Pin, thread};

use tracing::error;

/// A trait for spawning a future onto an asynchronous runtime.
///
/// The store uses it to run its update feed worker, and stream-driven cells
/// use it to drain their streams.
pub trait TaskSpawner: Send + Sync + 'static {
  /// Spawns a type-erased future.
  fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>);
}

/// Runs every spawned future to completion on its own named OS thread.
///
/// This is the default for a store's feed worker, so a store needs no async
/// runtime.
#[derive(Debug, Clone)]
pub struct ThreadSpawner {
  name: String,
}

impl ThreadSpawner {
  /// A spawner whose threads are named `fibre-store-worker`.
  pub fn new() -> Self {
    Self::named("fibre-store-worker")
  }

  /// A spawner whose threads carry `name`.
  pub fn named(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }
}

impl Default for ThreadSpawner {
  fn default() -> Self {
    Self::new()
  }
}

impl TaskSpawner for ThreadSpawner {
  fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>) {
    let spawned = thread::Builder::new()
      .name(self.name.clone())
      .spawn(move || futures_executor::block_on(future));

    if let Err(err) = spawned {
      error!(thread = %self.name, error = %err, "failed to start worker thread");
    }
  }
}

#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioSpawner(tokio::runtime::Handle);

#[cfg(feature = "tokio")]
impl TokioSpawner {
  /// Creates a spawner that uses the current Tokio runtime context.
  /// Panics if called outside of a Tokio runtime.
  pub fn new() -> Self {
    Self(tokio::runtime::Handle::current())
  }

  /// Creates a spawner for an explicit runtime handle.
  pub fn from_handle(handle: tokio::runtime::Handle) -> Self {
    Self(handle)
  }
}

#[cfg(feature = "tokio")]
impl TaskSpawner for TokioSpawner {
  fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>) {
    self.0.spawn(future);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::mpsc;
  use std::time::Duration;

  #[test]
  fn default_thread_spawner_names_its_threads() {
    let (tx, rx) = mpsc::channel();
    ThreadSpawner::new().spawn(Box::pin(async move {
      let name = thread::current().name().map(str::to_string);
      let _ = tx.send(name);
    }));

    let name = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(name.as_deref(), Some("fibre-store-worker"));
  }
}

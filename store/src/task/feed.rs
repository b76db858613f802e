use crate::runtime::TaskSpawner;
use crate::shared::StoreShared;
use crate::source::{DataSource, UpdateStream};

use std::hash::BuildHasher;
use std::sync::Weak;

use futures_util::future::{AbortRegistration, Abortable};
use futures_util::StreamExt;
use tracing::debug;

/// Spawns the worker that drains a store's update feed.
///
/// There is exactly one worker per store, so every feed-driven cell write
/// happens on that single context in feed order. The worker holds the store
/// weakly and ends when the store is gone, when the feed ends, or when the
/// store aborts it on drop.
pub(crate) fn spawn<S, H>(
  store: Weak<StoreShared<S, H>>,
  mut updates: UpdateStream<S::Key, S::Value>,
  registration: AbortRegistration,
  spawner: &dyn TaskSpawner,
) where
  S: DataSource,
  H: BuildHasher + Send + Sync + 'static,
{
  let drain = async move {
    debug!("update feed worker started");
    while let Some(update) = updates.next().await {
      match store.upgrade() {
        Some(store) => store.route(update),
        None => break,
      }
    }
    debug!("update feed worker finished");
  };

  spawner.spawn(Box::pin(async move {
    if Abortable::new(drain, registration).await.is_err() {
      debug!("update feed worker aborted");
    }
  }));
}

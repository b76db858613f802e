use super::{Cell, Channel};
use crate::runtime::TaskSpawner;

use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable};
use futures_util::{Stream, StreamExt};
use tracing::debug;

/// A cell driven by an arbitrary stream of values.
///
/// A background task drains the stream into the cell whether or not anyone is
/// subscribed, so `get` stays current. The task is aborted when the cell is
/// dropped. When the stream ends the cell keeps its last value.
#[derive(Debug)]
pub(crate) struct GeneralObserved<T> {
  channel: Arc<Channel<T>>,
  driver: AbortHandle,
}

impl<T: Clone + Send + 'static> GeneralObserved<T> {
  pub(crate) fn new<S>(initial: T, updates: S, spawner: &dyn TaskSpawner) -> Arc<Self>
  where
    S: Stream<Item = T> + Send + 'static,
  {
    let channel = Arc::new(Channel::new(initial));
    let target = Arc::downgrade(&channel);
    let (driver, registration) = AbortHandle::new_pair();

    let drive = async move {
      let mut updates = Box::pin(updates);
      while let Some(value) = updates.next().await {
        match target.upgrade() {
          Some(channel) => channel.publish(value),
          None => break,
        }
      }
    };
    spawner.spawn(Box::pin(async move {
      if Abortable::new(drive, registration).await.is_err() {
        debug!("stream-driven cell dropped, driver aborted");
      }
    }));

    Arc::new(Self { channel, driver })
  }
}

impl<T: Clone + Send + 'static> Cell<T> for GeneralObserved<T> {
  fn channel(&self) -> &Channel<T> {
    &self.channel
  }
}

impl<T> Drop for GeneralObserved<T> {
  fn drop(&mut self) {
    self.driver.abort();
  }
}

#[cfg(test)]
mod tests {
  use crate::runtime::ThreadSpawner;
  use crate::Observed;
  use futures_util::stream;
  use std::time::Duration;

  const TEST_TIMEOUT: Duration = Duration::from_secs(2);

  #[test]
  fn drains_stream_without_subscribers() {
    let spawner = ThreadSpawner::named("general-cell-test");
    let observed = Observed::from_stream(0, stream::iter(vec![1, 2, 3]), &spawner);

    let deadline = std::time::Instant::now() + TEST_TIMEOUT;
    while observed.get() != 3 && std::time::Instant::now() < deadline {
      std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(observed.get(), 3);
  }

  #[test]
  fn subscriber_sees_values_published_after_subscribing() {
    let spawner = ThreadSpawner::named("general-cell-test");
    let (tx, rx) = futures::channel::mpsc::unbounded();
    let observed = Observed::from_stream(0, rx, &spawner);
    let subscription = observed.subscribe();

    tx.unbounded_send(7).unwrap();
    assert_eq!(subscription.recv_timeout(TEST_TIMEOUT), Ok(7));
    assert_eq!(observed.get(), 7);
  }

  #[test]
  fn dropping_cell_stops_driver() {
    let spawner = ThreadSpawner::named("general-cell-test");
    let (tx, rx) = futures::channel::mpsc::unbounded::<i32>();
    let observed = Observed::from_stream(0, rx, &spawner);
    drop(observed);

    // The aborted driver drops the receiver, closing the channel.
    let deadline = std::time::Instant::now() + TEST_TIMEOUT;
    while !tx.is_closed() && std::time::Instant::now() < deadline {
      std::thread::sleep(Duration::from_millis(5));
    }
    assert!(tx.is_closed());
  }
}

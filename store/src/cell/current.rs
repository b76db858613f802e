use super::{Cell, Channel};

use std::sync::Arc;

/// The cell the store hands out: a mutable current value the store writes
/// whenever the update feed reports a change for its key.
#[derive(Debug)]
pub(crate) struct CurrentValueObserved<T> {
  channel: Channel<T>,
}

impl<T: Clone + Send + 'static> CurrentValueObserved<T> {
  pub(crate) fn new(value: T) -> Arc<Self> {
    Arc::new(Self {
      channel: Channel::new(value),
    })
  }

  /// Overwrites the current value and publishes it to every subscriber.
  pub(crate) fn set(&self, value: T) {
    self.channel.publish(value);
  }
}

impl<T: Clone + Send + 'static> Cell<T> for CurrentValueObserved<T> {
  fn channel(&self) -> &Channel<T> {
    &self.channel
  }
}

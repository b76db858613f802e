use super::channel::Relay;
use super::{Cell, Channel, Observed};

use std::sync::Arc;

/// An array-valued cell aggregating an ordered list of child cells.
///
/// Slot `i` always mirrors child `i`; positions are fixed when the cell is
/// built. The children are held strongly so none of them can be evicted from
/// a store while the aggregate is alive.
pub(crate) struct CombinedObserved<T> {
  channel: Arc<Channel<Vec<T>>>,
  _children: Vec<Observed<T>>,
}

impl<T: Clone + Send + 'static> CombinedObserved<T> {
  pub(crate) fn new(children: Vec<Observed<T>>) -> Arc<Self> {
    let channel = Arc::new(Channel::new(Vec::with_capacity(children.len())));

    for (index, child) in children.iter().enumerate() {
      // The relay only holds the aggregate weakly; children must not keep
      // their parents alive.
      child.cell.channel().relay_with(
        |current| channel.modify(|values| values.push(current.clone())),
        Relay::new(
          Arc::downgrade(&channel),
          move |combined: &Channel<Vec<T>>, value: &T| {
            combined.modify(|values| {
              if let Some(slot) = values.get_mut(index) {
                *slot = value.clone();
              }
            });
          },
        ),
      );
    }

    Arc::new(Self {
      channel,
      _children: children,
    })
  }
}

impl<T: Clone + Send + 'static> Cell<Vec<T>> for CombinedObserved<T> {
  fn channel(&self) -> &Channel<Vec<T>> {
    &self.channel
  }
}

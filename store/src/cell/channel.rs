use crate::subscription::{self, Slot, Subscription};

use std::fmt;
use std::sync::Weak;

use parking_lot::Mutex;

/// The observer list is swept for detached entries on attach once it reaches
/// this length, and again each time it doubles after a sweep.
const MIN_PRUNE_LEN: usize = 8;

/// A callback attached to a cell by another cell. It holds the receiving side
/// weakly, so it can tell it is detached without being called.
pub(crate) struct Relay<T> {
  attached: Box<dyn Fn() -> bool + Send + Sync>,
  deliver: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Relay<T> {
  /// Forwards every value to `target` through `deliver` while `target` lives.
  pub(crate) fn new<U, F>(target: Weak<U>, deliver: F) -> Self
  where
    U: Send + Sync + 'static,
    F: Fn(&U, &T) + Send + Sync + 'static,
  {
    let liveness = target.clone();
    Self {
      attached: Box::new(move || liveness.strong_count() > 0),
      deliver: Box::new(move |value| match target.upgrade() {
        Some(target) => {
          deliver(&target, value);
          true
        }
        None => false,
      }),
    }
  }
}

enum Observer<T> {
  Subscriber(Weak<Slot<T>>),
  Relay(Relay<T>),
}

impl<T: Clone> Observer<T> {
  /// Delivers `value`, returning whether this observer is still attached.
  fn notify(&self, value: &T) -> bool {
    match self {
      Observer::Subscriber(slot) => match slot.upgrade() {
        Some(slot) => {
          slot.deliver(value.clone());
          true
        }
        None => false,
      },
      Observer::Relay(relay) => (relay.deliver)(value),
    }
  }

  fn is_attached(&self) -> bool {
    match self {
      Observer::Subscriber(slot) => slot.strong_count() > 0,
      Observer::Relay(relay) => (relay.attached)(),
    }
  }
}

struct State<T> {
  value: T,
  observers: Vec<Observer<T>>,
  prune_at: usize,
}

impl<T: Clone> State<T> {
  /// Adds `observer`, first sweeping out detached ones if the list has grown
  /// past its threshold. A cell that never publishes stays bounded this way.
  fn attach(&mut self, observer: Observer<T>) {
    if self.observers.len() >= self.prune_at {
      self.observers.retain(Observer::is_attached);
      self.prune_at = (self.observers.len() * 2).max(MIN_PRUNE_LEN);
    }
    self.observers.push(observer);
  }
}

/// The current-value slot plus multicast fan-out shared by every cell variant.
///
/// The value write and the fan-out happen under one lock, so all observers of
/// a channel see its changes in the order they were made. Observers that went
/// away are pruned while publishing and when new ones attach.
pub(crate) struct Channel<T> {
  state: Mutex<State<T>>,
}

impl<T> fmt::Debug for Channel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Channel")
      .field("observers", &self.state.lock().observers.len())
      .finish_non_exhaustive()
  }
}

impl<T: Clone> Channel<T> {
  pub(crate) fn new(value: T) -> Self {
    Self {
      state: Mutex::new(State {
        value,
        observers: Vec::new(),
        prune_at: MIN_PRUNE_LEN,
      }),
    }
  }

  pub(crate) fn get(&self) -> T {
    self.state.lock().value.clone()
  }

  pub(crate) fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
    f(&self.state.lock().value)
  }

  /// Replaces the current value and notifies every observer.
  pub(crate) fn publish(&self, value: T) {
    self.modify(|current| *current = value);
  }

  /// Mutates the current value in place and notifies every observer with the
  /// result. Always notifies, even if `f` left the value unchanged.
  pub(crate) fn modify(&self, f: impl FnOnce(&mut T)) {
    let mut guard = self.state.lock();
    let State {
      value, observers, ..
    } = &mut *guard;
    f(value);
    observers.retain(|observer| observer.notify(value));
  }

  pub(crate) fn subscribe(&self) -> Subscription<T> {
    let (slot, subscription) = subscription::slot();
    self.state.lock().attach(Observer::Subscriber(slot));
    subscription
  }

  /// Hands the current value to `seed` and attaches `relay`, atomically with
  /// respect to publishing: no change can slip in between the two.
  pub(crate) fn relay_with(&self, seed: impl FnOnce(&T), relay: Relay<T>) {
    let mut guard = self.state.lock();
    seed(&guard.value);
    guard.attach(Observer::Relay(relay));
  }

  #[cfg(test)]
  pub(crate) fn observer_count(&self) -> usize {
    self.state.lock().observers.len()
  }
}

impl<T> Drop for Channel<T> {
  fn drop(&mut self) {
    for observer in self.state.get_mut().observers.drain(..) {
      if let Observer::Subscriber(slot) = observer {
        if let Some(slot) = slot.upgrade() {
          slot.disconnect();
        }
      }
    }
  }
}

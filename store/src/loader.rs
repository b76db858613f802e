use parking_lot::Mutex;
use std::collections::VecDeque;
use std::thread::{self, Thread};

/// The internal state of a lookup being performed for the store.
pub(crate) enum State<T> {
  Loading,
  Complete(T),
  /// The loading thread unwound before producing a result.
  Abandoned,
}

pub(crate) struct Inner<T> {
  pub(crate) state: State<T>,
  pub(crate) waiters: VecDeque<Thread>,
}

/// The in-flight marker for one key. The caller that started the lookup
/// completes it; every concurrent caller for the same key parks on it instead
/// of issuing a second lookup.
pub(crate) struct LoadFuture<T> {
  pub(crate) inner: Mutex<Inner<T>>,
}

impl<T: Clone> LoadFuture<T> {
  /// Creates a new `LoadFuture` in the "Loading" state.
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Loading,
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Completes the load with `outcome`, waking all waiters.
  pub fn complete(&self, outcome: T) {
    self.finish(State::Complete(outcome));
  }

  /// Marks the load as abandoned, waking all waiters so they can retry.
  pub fn abandon(&self) {
    self.finish(State::Abandoned);
  }

  fn finish(&self, state: State<T>) {
    let mut inner = self.inner.lock();
    inner.state = state;
    for waiter in inner.waiters.drain(..) {
      waiter.unpark();
    }
  }

  /// Blocks until the load finishes. Returns `None` if it was abandoned.
  pub fn wait(&self) -> Option<T> {
    loop {
      let mut inner = self.inner.lock();
      match &inner.state {
        State::Complete(outcome) => return Some(outcome.clone()),
        State::Abandoned => return None,
        State::Loading => {
          inner.waiters.push_back(thread::current());
          drop(inner);
          thread::park();
        }
      }
    }
  }
}

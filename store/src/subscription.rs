use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use fibre::{RecvError, RecvErrorTimeout, TryRecvError};
use futures_util::Stream;
use parking_lot::Mutex;

// --- Waiter & Internal State ---

/// Represents either a sync or async waiter.
#[derive(Debug)]
enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

#[derive(Debug)]
struct SlotInternal<T> {
  /// The most recent value not yet taken by the consumer. A newer delivery
  /// overwrites it; there is never a backlog.
  latest: Option<T>,
  consumer_waiter: Option<Waiter>,
  /// True once the cell feeding this slot has been dropped.
  is_disconnected: bool,
  /// How many undelivered values were overwritten by a newer one.
  replaced_count: u64,
}

/// The single-value slot shared between a cell (weakly) and one `Subscription`.
#[derive(Debug)]
pub(crate) struct Slot<T> {
  internal: Mutex<SlotInternal<T>>,
}

impl<T> Slot<T> {
  fn wake_consumer(guard: &mut SlotInternal<T>) {
    if let Some(waiter) = guard.consumer_waiter.take() {
      waiter.wake();
    }
  }

  /// Stores `value` as the latest state and wakes the consumer. Never blocks
  /// on the consumer.
  pub(crate) fn deliver(&self, value: T) {
    let mut guard = self.internal.lock();
    if guard.latest.replace(value).is_some() {
      guard.replaced_count += 1;
    }
    Self::wake_consumer(&mut guard);
  }

  /// Tells the consumer no further values will arrive.
  pub(crate) fn disconnect(&self) {
    let mut guard = self.internal.lock();
    if !guard.is_disconnected {
      guard.is_disconnected = true;
      Self::wake_consumer(&mut guard);
    }
  }
}

/// Creates a slot and the subscription that owns it. The caller keeps only the
/// weak half, so dropping the subscription detaches it.
pub(crate) fn slot<T>() -> (Weak<Slot<T>>, Subscription<T>) {
  let slot = Arc::new(Slot {
    internal: Mutex::new(SlotInternal {
      latest: None,
      consumer_waiter: None,
      is_disconnected: false,
      replaced_count: 0,
    }),
  });
  (Arc::downgrade(&slot), Subscription { slot })
}

/// A handle receiving the changes of one observed cell.
///
/// Only values published after the subscription was created are received;
/// the cell's state at subscription time is not replayed. A subscriber that
/// falls behind sees only the newest state when it next receives.
///
/// Once the cell is dropped and the last pending value has been taken,
/// receiving fails with `Disconnected` (or the stream ends).
///
/// A subscription has a single consumer. It may be moved to another thread or
/// task, but only one caller may wait on it at a time: the slot remembers one
/// waiter, and a second concurrent `recv` replaces the first one's wakeup.
/// Call [`subscribe`](crate::Observed::subscribe) again for another consumer.
#[derive(Debug)]
pub struct Subscription<T> {
  slot: Arc<Slot<T>>,
}

impl<T> Subscription<T> {
  /// Attempts to receive the latest change without blocking.
  pub fn try_recv(&self) -> Result<T, TryRecvError> {
    let mut guard = self.slot.internal.lock();

    if let Some(value) = guard.latest.take() {
      Ok(value)
    } else if guard.is_disconnected {
      Err(TryRecvError::Disconnected)
    } else {
      Err(TryRecvError::Empty)
    }
  }

  /// Receives the next change, blocking the current thread until one arrives.
  pub fn recv(&self) -> Result<T, RecvError> {
    loop {
      let mut guard = self.slot.internal.lock();
      match guard.latest.take() {
        Some(value) => return Ok(value),
        None => {
          if guard.is_disconnected {
            return Err(RecvError::Disconnected);
          }
          guard.consumer_waiter = Some(Waiter::Sync(thread::current()));
          drop(guard);
          thread::park();
        }
      }
    }
  }

  /// Receives the next change, blocking for at most `timeout`.
  pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvErrorTimeout> {
    let start_time = Instant::now();
    loop {
      let mut guard = self.slot.internal.lock();
      match guard.latest.take() {
        Some(value) => return Ok(value),
        None => {
          if guard.is_disconnected {
            return Err(RecvErrorTimeout::Disconnected);
          }

          let elapsed = start_time.elapsed();
          if elapsed >= timeout {
            return Err(RecvErrorTimeout::Timeout);
          }
          let remaining_timeout = timeout - elapsed;

          guard.consumer_waiter = Some(Waiter::Sync(thread::current()));
          drop(guard);
          thread::park_timeout(remaining_timeout);
        }
      }
    }
  }

  /// Receives the next change asynchronously.
  pub fn recv_async(&self) -> RecvFuture<'_, T> {
    RecvFuture { subscription: self }
  }

  /// Returns true if the observed cell is gone. A pending value may still be
  /// waiting to be received.
  pub fn is_disconnected(&self) -> bool {
    self.slot.internal.lock().is_disconnected
  }

  fn poll_slot(&self, cx: &mut Context<'_>) -> Poll<Option<T>> {
    let mut guard = self.slot.internal.lock();

    if let Some(value) = guard.latest.take() {
      return Poll::Ready(Some(value));
    }
    if guard.is_disconnected {
      return Poll::Ready(None);
    }

    match &guard.consumer_waiter {
      Some(Waiter::Async(existing_waker)) if existing_waker.will_wake(cx.waker()) => {}
      _ => {
        guard.consumer_waiter = Some(Waiter::Async(cx.waker().clone()));
      }
    }

    Poll::Pending
  }
}

impl<T> Stream for Subscription<T> {
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
    self.poll_slot(cx)
  }
}

// --- Future Implementation ---

#[must_use = "futures do nothing unless you .await or poll them"]
pub struct RecvFuture<'a, T> {
  subscription: &'a Subscription<T>,
}

impl<'a, T> Future for RecvFuture<'a, T> {
  type Output = Result<T, RecvError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    match self.subscription.poll_slot(cx) {
      Poll::Ready(Some(value)) => Poll::Ready(Ok(value)),
      Poll::Ready(None) => Poll::Ready(Err(RecvError::Disconnected)),
      Poll::Pending => Poll::Pending,
    }
  }
}

impl<T> Subscription<T> {
  #[cfg(test)]
  fn replaced_count(&self) -> u64 {
    self.slot.internal.lock().replaced_count
  }
}

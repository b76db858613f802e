//! Observable cells: a current value plus a multicast change feed.
//!
//! Every variant is handed out behind the same [`Observed`] handle:
//! - the store's per-key cells, which the store writes on update events,
//! - aggregates built with [`Observed::combine`],
//! - stream-driven cells built with [`Observed::from_stream`] or [`Observed::map`].

mod channel;
mod combined;
mod current;
mod general;

pub(crate) use channel::Channel;
pub(crate) use current::CurrentValueObserved;

use crate::runtime::TaskSpawner;
use crate::subscription::Subscription;

use std::fmt;
use std::sync::{Arc, Weak};

use futures_util::{Stream, StreamExt};

/// Implemented by every cell variant.
pub(crate) trait Cell<T>: Send + Sync {
  fn channel(&self) -> &Channel<T>;
}

/// A shared handle to a live cell.
///
/// Cloning the handle shares the cell. The cell lives as long as any handle
/// (or an aggregate built on it) does; a store only remembers it weakly.
pub struct Observed<T> {
  pub(crate) cell: Arc<dyn Cell<T>>,
}

impl<T> Clone for Observed<T> {
  fn clone(&self) -> Self {
    Self {
      cell: self.cell.clone(),
    }
  }
}

impl<T: Clone + Send + 'static> Observed<T> {
  pub(crate) fn from_cell<C>(cell: Arc<C>) -> Self
  where
    C: Cell<T> + 'static,
  {
    Self { cell }
  }

  /// Returns a clone of the current value.
  pub fn get(&self) -> T {
    self.cell.channel().get()
  }

  /// Runs `f` against the current value without cloning it.
  ///
  /// The cell is locked while `f` runs; `f` must not touch this cell.
  pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
    self.cell.channel().with(f)
  }

  /// Subscribes to changes published from now on. The current value is not
  /// replayed; read it with [`get`](Self::get).
  pub fn subscribe(&self) -> Subscription<T> {
    self.cell.channel().subscribe()
  }

  /// Returns a non-owning handle to this cell.
  pub fn downgrade(&self) -> WeakObserved<T> {
    WeakObserved {
      cell: Arc::downgrade(&self.cell),
    }
  }

  /// Returns true if both handles point at the same cell.
  pub fn ptr_eq(this: &Self, other: &Self) -> bool {
    Arc::as_ptr(&this.cell) as *const () == Arc::as_ptr(&other.cell) as *const ()
  }

  /// Builds an array-valued cell over `cells`, in the given order.
  ///
  /// Every change of a child republishes the whole array. The aggregate holds
  /// its children strongly for its entire lifetime.
  pub fn combine(cells: impl IntoIterator<Item = Observed<T>>) -> Observed<Vec<T>> {
    Observed::from_cell(combined::CombinedObserved::new(cells.into_iter().collect()))
  }

  /// Builds a cell that starts at `initial` and takes every value `updates`
  /// yields. The stream is drained on `spawner` for as long as the cell lives,
  /// regardless of subscribers.
  pub fn from_stream<S>(initial: T, updates: S, spawner: &dyn TaskSpawner) -> Self
  where
    S: Stream<Item = T> + Send + 'static,
  {
    Observed::from_cell(general::GeneralObserved::new(initial, updates, spawner))
  }

  /// Derives a cell holding `f` applied to this cell's value.
  ///
  /// The derived cell keeps this one alive and is driven on `spawner`.
  pub fn map<U, F>(&self, f: F, spawner: &dyn TaskSpawner) -> Observed<U>
  where
    U: Clone + Send + 'static,
    F: Fn(&T) -> U + Send + 'static,
  {
    let changes = self.subscribe();
    let initial = self.with(|value| f(value));
    // The driver owns a strong handle to the source cell, so the source lives
    // at least as long as the derived cell's stream.
    let source = self.clone();
    let updates = changes.map(move |value| {
      let _keep_alive = &source;
      f(&value)
    });
    Observed::from_stream(initial, updates, spawner)
  }
}

impl<T: Clone + Send + fmt::Debug + 'static> fmt::Debug for Observed<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.with(|value| f.debug_tuple("Observed").field(value).finish())
  }
}

/// A non-owning handle to a cell. It does not keep the cell alive.
pub struct WeakObserved<T> {
  cell: Weak<dyn Cell<T>>,
}

impl<T> Clone for WeakObserved<T> {
  fn clone(&self) -> Self {
    Self {
      cell: self.cell.clone(),
    }
  }
}

impl<T> WeakObserved<T> {
  /// Returns a strong handle if the cell is still alive.
  pub fn upgrade(&self) -> Option<Observed<T>> {
    self.cell.upgrade().map(|cell| Observed { cell })
  }

  /// Returns true while some strong handle to the cell exists.
  pub fn is_alive(&self) -> bool {
    self.cell.strong_count() > 0
  }
}

impl<T> fmt::Debug for WeakObserved<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WeakObserved")
      .field("alive", &self.is_alive())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::runtime::ThreadSpawner;
  use std::time::Duration;

  #[test]
  fn clones_share_the_cell() {
    let cell = CurrentValueObserved::new(1);
    let first = Observed::from_cell(cell.clone());
    let second = first.clone();
    assert!(Observed::ptr_eq(&first, &second));

    let other = Observed::from_cell(CurrentValueObserved::new(1));
    assert!(!Observed::ptr_eq(&first, &other));
  }

  #[test]
  fn weak_handle_dies_with_last_strong_handle() {
    let observed = Observed::from_cell(CurrentValueObserved::new("v"));
    let weak = observed.downgrade();
    assert!(weak.upgrade().is_some());

    drop(observed);
    assert!(!weak.is_alive());
    assert!(weak.upgrade().is_none());
  }

  #[test]
  fn map_follows_source_changes() {
    let spawner = ThreadSpawner::named("map-test");
    let cell = CurrentValueObserved::new(2);
    let source = Observed::from_cell(cell.clone());
    let doubled = source.map(|value| value * 2, &spawner);
    assert_eq!(doubled.get(), 4);

    let subscription = doubled.subscribe();
    cell.set(5);
    assert_eq!(subscription.recv_timeout(Duration::from_secs(2)), Ok(10));
  }

  #[test]
  fn map_keeps_source_alive() {
    let spawner = ThreadSpawner::named("map-test");
    let source = Observed::from_cell(CurrentValueObserved::new(1));
    let weak = source.downgrade();
    let derived = source.map(|value| value + 1, &spawner);
    drop(source);
    assert!(weak.is_alive());
    assert_eq!(derived.get(), 2);
  }
}

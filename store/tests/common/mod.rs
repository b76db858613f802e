#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use fibre_store::{DataSource, Store, StoreBuilder, Update, UpdateStream};
use futures::channel::mpsc;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Foo {
  pub id: &'static str,
  pub bar: i32,
}

pub fn foo(id: &'static str, bar: i32) -> Foo {
  Foo { id, bar }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError(pub String);

impl fmt::Display for SourceError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "source error: {}", self.0)
  }
}

impl std::error::Error for SourceError {}

struct Inner {
  data: Mutex<HashMap<&'static str, Foo>>,
  failing: Mutex<HashSet<&'static str>>,
  delay: Mutex<Option<Duration>>,
  panic_next: AtomicBool,
  lookups: AtomicUsize,
  tx: mpsc::UnboundedSender<Update<&'static str, Foo>>,
  rx: Mutex<Option<mpsc::UnboundedReceiver<Update<&'static str, Foo>>>>,
}

/// An in-memory data source. Clones share the same records and feed, so a
/// test can keep one handle while the store owns another.
#[derive(Clone)]
pub struct TestSource {
  inner: Arc<Inner>,
}

impl TestSource {
  pub fn new() -> Self {
    Self::with(Vec::new())
  }

  pub fn with(records: Vec<Foo>) -> Self {
    let (tx, rx) = mpsc::unbounded();
    Self {
      inner: Arc::new(Inner {
        data: Mutex::new(records.into_iter().map(|r| (r.id, r)).collect()),
        failing: Mutex::new(HashSet::new()),
        delay: Mutex::new(None),
        panic_next: AtomicBool::new(false),
        lookups: AtomicUsize::new(0),
        tx,
        rx: Mutex::new(Some(rx)),
      }),
    }
  }

  /// Stores `record` and emits it on the feed.
  pub fn set(&self, record: Foo) {
    self.inner.data.lock().unwrap().insert(record.id, record.clone());
    self.emit(Update::upsert(record.id, record));
  }

  /// Deletes the record and emits a removal on the feed.
  pub fn remove(&self, id: &'static str) {
    self.inner.data.lock().unwrap().remove(id);
    self.emit(Update::removal(id));
  }

  /// Stores `record` without emitting anything.
  pub fn put_silently(&self, record: Foo) {
    self.inner.data.lock().unwrap().insert(record.id, record);
  }

  /// Emits `update` on the feed. A store that has shut down its feed simply
  /// never sees it.
  pub fn emit(&self, update: Update<&'static str, Foo>) {
    let _ = self.inner.tx.unbounded_send(update);
  }

  /// True once the store side of the feed has been dropped.
  pub fn feed_closed(&self) -> bool {
    self.inner.tx.is_closed()
  }

  pub fn fail(&self, id: &'static str) {
    self.inner.failing.lock().unwrap().insert(id);
  }

  pub fn heal(&self, id: &'static str) {
    self.inner.failing.lock().unwrap().remove(id);
  }

  pub fn set_delay(&self, delay: Duration) {
    *self.inner.delay.lock().unwrap() = Some(delay);
  }

  /// Makes the next lookup panic after its delay.
  pub fn panic_next(&self) {
    self.inner.panic_next.store(true, Ordering::SeqCst);
  }

  pub fn lookups(&self) -> usize {
    self.inner.lookups.load(Ordering::SeqCst)
  }
}

impl DataSource for TestSource {
  type Key = &'static str;
  type Value = Foo;
  type Error = SourceError;

  fn value(&self, key: &&'static str) -> Result<Option<Foo>, SourceError> {
    self.inner.lookups.fetch_add(1, Ordering::SeqCst);
    let delay = *self.inner.delay.lock().unwrap();
    if let Some(delay) = delay {
      thread::sleep(delay);
    }
    if self.inner.panic_next.swap(false, Ordering::SeqCst) {
      panic!("lookup of {key} panicked");
    }
    if self.inner.failing.lock().unwrap().contains(key) {
      return Err(SourceError(format!("lookup of {key} failed")));
    }
    Ok(self.inner.data.lock().unwrap().get(key).cloned())
  }

  fn updates(&self) -> UpdateStream<&'static str, Foo> {
    let rx = self
      .inner
      .rx
      .lock()
      .unwrap()
      .take()
      .expect("updates() must only be called once");
    Box::pin(rx)
  }
}

pub fn build_store(source: TestSource) -> Store<TestSource> {
  StoreBuilder::new(source).build().unwrap()
}

/// Polls `condition` until it holds or `TEST_TIMEOUT` elapses.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + TEST_TIMEOUT;
  while Instant::now() < deadline {
    if condition() {
      return true;
    }
    thread::sleep(Duration::from_millis(5));
  }
  condition()
}

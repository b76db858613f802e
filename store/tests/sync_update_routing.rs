mod common;
use common::*;

use fibre_store::{TryRecvError, Update};

#[test]
fn test_updates_apply_in_feed_order() {
  let source = TestSource::with(vec![foo("a", 0)]);
  let store = build_store(source.clone());

  let a = store.value(&"a").unwrap().unwrap();
  for bar in 1..=50 {
    source.set(foo("a", bar));
  }

  assert!(wait_until(|| store.metrics().updates_applied == 50));
  assert_eq!(a.get(), foo("a", 50));
}

#[test]
fn test_subscriber_conflates_to_latest() {
  let source = TestSource::with(vec![foo("a", 0)]);
  let store = build_store(source.clone());

  let a = store.value(&"a").unwrap().unwrap();
  let subscription = a.subscribe();
  for bar in 1..=20 {
    source.set(foo("a", bar));
  }
  assert!(wait_until(|| a.get().bar == 20));

  // Whatever the subscriber missed, it ends up on the latest state.
  assert_eq!(subscription.try_recv(), Ok(foo("a", 20)));
  assert_eq!(subscription.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn test_update_without_cell_creates_nothing() {
  let source = TestSource::with(vec![foo("a", 1)]);
  let store = build_store(source.clone());

  let a = store.value(&"a").unwrap().unwrap();
  let watch_a = a.subscribe();
  let lookups_before = source.lookups();

  source.set(foo("z", 9));
  source.set(foo("a", 2));
  assert_eq!(watch_a.recv_timeout(TEST_TIMEOUT), Ok(foo("a", 2)));

  // The "z" event was dropped; nobody asked the data source for it.
  assert_eq!(source.lookups(), lookups_before);
  assert_eq!(store.metrics().updates_ignored, 1);

  // Asking now goes to the data source and sees the new record.
  let z = store.value(&"z").unwrap().unwrap();
  assert_eq!(z.get(), foo("z", 9));
  assert_eq!(source.lookups(), lookups_before + 1);
}

#[test]
fn test_removal_keeps_live_cell_value() {
  let source = TestSource::with(vec![foo("a", 1), foo("b", 1)]);
  let store = build_store(source.clone());

  let a = store.value(&"a").unwrap().unwrap();
  let b = store.value(&"b").unwrap().unwrap();
  let watch_a = a.subscribe();
  let watch_b = b.subscribe();

  source.remove("a");
  source.set(foo("b", 2));
  assert_eq!(watch_b.recv_timeout(TEST_TIMEOUT), Ok(foo("b", 2)));

  assert_eq!(a.get(), foo("a", 1));
  assert_eq!(watch_a.try_recv(), Err(TryRecvError::Empty));
  assert_eq!(store.metrics().updates_ignored, 1);

  // The cell is still the one the store hands out.
  let again = store.value(&"a").unwrap().unwrap();
  assert!(fibre_store::Observed::ptr_eq(&a, &again));
}

#[test]
fn test_update_for_dead_cell_purges_entry() {
  let source = TestSource::with(vec![foo("a", 1), foo("b", 1)]);
  let store = build_store(source.clone());

  drop(store.value(&"a").unwrap().unwrap());
  let b = store.value(&"b").unwrap().unwrap();
  let watch_b = b.subscribe();

  source.emit(Update::upsert("a", foo("a", 2)));
  source.set(foo("b", 2));
  assert_eq!(watch_b.recv_timeout(TEST_TIMEOUT), Ok(foo("b", 2)));

  let metrics = store.metrics();
  assert_eq!(metrics.stale_purged, 1);
  assert_eq!(metrics.updates_ignored, 1);
}

#[test]
fn test_update_reaches_combined_subscriber() {
  let source = TestSource::with(vec![foo("a", 1), foo("b", 1)]);
  let store = build_store(source.clone());

  let both = store.values(&["a", "b"]).unwrap();
  let subscription = both.subscribe();

  source.set(foo("a", 5));
  assert_eq!(
    subscription.recv_timeout(TEST_TIMEOUT),
    Ok(vec![foo("a", 5), foo("b", 1)])
  );
}

#[test]
fn test_feed_keeps_running_after_lookup_failure() {
  let source = TestSource::with(vec![foo("a", 1), foo("b", 1)]);
  let store = build_store(source.clone());
  let a = store.value(&"a").unwrap().unwrap();
  let watch_a = a.subscribe();

  source.fail("b");
  assert!(store.value(&"b").is_err());

  source.set(foo("a", 2));
  assert_eq!(watch_a.recv_timeout(TEST_TIMEOUT), Ok(foo("a", 2)));
}

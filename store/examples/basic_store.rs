use fibre_store::{DataSource, StoreBuilder, Update, UpdateStream};
use futures::channel::mpsc;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Account {
  name: &'static str,
  balance: i64,
}

#[derive(Debug)]
struct LedgerError;

impl fmt::Display for LedgerError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ledger unavailable")
  }
}

impl std::error::Error for LedgerError {}

/// A toy ledger. Writes go through `deposit`, which also announces them.
#[derive(Clone)]
struct Ledger {
  accounts: Arc<Mutex<HashMap<&'static str, Account>>>,
  tx: mpsc::UnboundedSender<Update<&'static str, Account>>,
  rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<Update<&'static str, Account>>>>>,
}

impl Ledger {
  fn new() -> Self {
    let (tx, rx) = mpsc::unbounded();
    Self {
      accounts: Arc::default(),
      tx,
      rx: Arc::new(Mutex::new(Some(rx))),
    }
  }

  fn deposit(&self, name: &'static str, amount: i64) {
    let account = {
      let mut accounts = self.accounts.lock().unwrap();
      let account = accounts.entry(name).or_insert(Account { name, balance: 0 });
      account.balance += amount;
      account.clone()
    };
    let _ = self.tx.unbounded_send(Update::upsert(name, account));
  }
}

impl DataSource for Ledger {
  type Key = &'static str;
  type Value = Account;
  type Error = LedgerError;

  fn value(&self, key: &&'static str) -> Result<Option<Account>, LedgerError> {
    Ok(self.accounts.lock().unwrap().get(key).cloned())
  }

  fn updates(&self) -> UpdateStream<&'static str, Account> {
    match self.rx.lock().unwrap().take() {
      Some(rx) => Box::pin(rx),
      None => Box::pin(futures::stream::empty()),
    }
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
    .init();

  let ledger = Ledger::new();
  ledger.deposit("alice", 100);
  ledger.deposit("bob", 50);

  let store = StoreBuilder::new(ledger.clone())
    .feed_thread_name("ledger-feed")
    .build()
    .expect("Failed to build store");

  let alice = store.value(&"alice").unwrap().expect("alice has an account");
  println!("alice: {:?}", alice.get());

  let everyone = store.values(&["alice", "bob", "carol"]).unwrap();
  println!("everyone (carol has no account): {:?}", everyone.get());

  let changes = everyone.subscribe();
  ledger.deposit("bob", 25);
  match changes.recv_timeout(Duration::from_secs(1)) {
    Ok(accounts) => println!("after bob's deposit: {:?}", accounts),
    Err(err) => println!("no change seen: {:?}", err),
  }

  // carol opens an account, but the aggregate above was built without her.
  ledger.deposit("carol", 10);
  std::thread::sleep(Duration::from_millis(100));
  println!("everyone, still without carol: {:?}", everyone.get());
  println!("carol, looked up fresh: {:?}", store.value(&"carol").unwrap());

  println!("\nStore metrics: {:#?}", store.metrics());
}

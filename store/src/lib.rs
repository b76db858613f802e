//! A concurrent, identity-keyed reactive cache.
//!
//! A [`Store`] reads through a [`DataSource`] and hands out one shared, live
//! [`Observed`] cell per key. The data source's update feed is drained by a
//! single background worker which writes each change into the matching cell,
//! if that cell is still alive, and from there to its subscribers.
//!
//! # Features
//! - **Identity sharing**: concurrent lookups of one key share one cell and
//!   one data source call.
//! - **Weak bookkeeping**: the store never keeps a cell alive; unused cells
//!   are dropped and their map entries purged lazily.
//! - **Conflating subscriptions**: subscribers always see the latest state,
//!   never a backlog. Sync, async and `Stream` consumption are all supported.
//! - **Aggregates**: array-valued cells over several keys, and cells driven by
//!   arbitrary streams.
//! - **Observability**: `tracing` events and lock-free metrics.

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod metrics;
pub mod runtime;
pub mod source;
pub mod subscription;

// Internal, crate-only modules
mod cell;
mod loader;
mod shared;
mod store;
mod task;

// Re-export the primary user-facing types for convenience
pub use builder::StoreBuilder;
pub use cell::{Observed, WeakObserved};
pub use error::{BuildError, LookupFailure};
pub use handles::Store;
pub use metrics::MetricsSnapshot;
pub use runtime::{TaskSpawner, ThreadSpawner};
#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
pub use source::{DataSource, Update, UpdateStream};
pub use subscription::{RecvFuture, Subscription};

pub use fibre::{RecvError, RecvErrorTimeout, TryRecvError};

//! Background work owned by a store.

pub(crate) mod feed;

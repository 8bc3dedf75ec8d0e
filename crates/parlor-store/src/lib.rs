//! Chat history persistence for Parlor.
//!
//! [`MessageStore`] is the port; [`InMemoryStore`] and [`JsonLinesStore`]
//! are the bundled adapters. The room talks to a store only through a
//! [`PersistenceHandle`], so a slow or broken backend costs history, not
//! availability.

#![allow(async_fn_in_trait)]

mod error;
mod store;
mod worker;

pub use error::StoreError;
pub use store::{InMemoryStore, JsonLinesStore, MessageStore};
pub use worker::{DEFAULT_RECENT_TIMEOUT, PendingHistory, PersistenceHandle, spawn_worker};

//! # Relay Store
//!
//! The record store contract the session relay is written against.
//!
//! A record store keeps typed records keyed by `(record_type, id)`, each
//! with an opaque payload and a store-assigned version. It supports point
//! writes, point deletes, and a long-lived change stream per type keyed by
//! a [`Cursor`](relay_protocol::Cursor).
//!
//! This crate provides:
//! - [`RecordStore`], the async trait the relay depends on
//! - [`MemoryRecordStore`], an in-memory store with a live change feed
//! - [`MockRecordStore`], a scriptable store for tests
//!
//! # Sync streams
//!
//! `open_sync` first replays stored records newer than the cursor in
//! version order, then follows live writes. A cursor from another epoch
//! replays from the start. Dropping the returned stream releases the
//! subscription.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod error;
mod memory;
mod mock;
mod record;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryRecordStore, MemoryStoreConfig};
pub use mock::{MockRecordStore, ScriptEnd, StoreCall, StreamProbe, SyncScript};
pub use record::{Record, StoreBatch};
pub use store::{BatchStream, RecordStore};

//! # Relay Protocol
//!
//! Types shared by the session relay, its callers and the record store.
//!
//! This crate provides:
//! - [`Session`], the typed entity the relay exposes
//! - [`Any`], the type-tagged envelope written as a record payload
//! - [`Cursor`], a position in the store's change log
//! - Relay wire messages (add, delete, sync) with CBOR codecs
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod any;
mod cursor;
mod fields;
mod messages;
mod session;

pub use any::{Any, TypedMessage};
pub use cursor::Cursor;
pub use messages::{AddRequest, DeleteRequest, RelayMessage, SyncRequest, SyncResponse};
pub use session::{Session, SESSION_TYPE_URL};

pub use relay_codec::{CodecError, CodecResult, Decode, Encode, Value, MAX_DEPTH};

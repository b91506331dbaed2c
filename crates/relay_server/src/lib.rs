//! # Relay Server
//!
//! Typed session operations on top of a generic record store.
//!
//! This crate provides:
//! - [`SessionRelay`]: add, delete and sync of [`Session`](relay_protocol::Session)s
//! - [`SessionSyncStream`]: the decoded, ordered, cancellable change stream
//! - [`SessionServer`]: a message-level front end for an RPC layer
//!
//! # Sync
//!
//! A sync call opens exactly one store stream and spawns one task for it.
//! Each store batch is decoded as a unit. A batch with any undecodable
//! record is not delivered; the caller receives
//! [`RelayError::StreamDecode`] and the stream ends. Every reply carries
//! the batch's server version and last record version, so a caller can
//! reconnect from [`SyncReply::cursor`].
//!
//! Dropping the stream, or cancelling the token given to
//! [`SessionRelay::sync_with_token`], stops the task and drops the store
//! stream.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod relay;
mod server;
mod sync;

pub use config::{RelayConfig, DEFAULT_SYNC_CHANNEL_CAPACITY};
pub use error::{ErrorCode, RelayError, RelayResult};
pub use relay::SessionRelay;
pub use server::SessionServer;
pub use sync::{SessionSyncStream, SyncReply, SyncState, Termination};

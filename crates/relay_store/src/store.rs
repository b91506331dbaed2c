//! The record store contract.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use relay_protocol::Cursor;

use crate::error::StoreResult;
use crate::record::StoreBatch;

/// A long-lived stream of change batches.
///
/// Dropping the stream releases the store-side subscription.
pub type BatchStream = BoxStream<'static, StoreResult<StoreBatch>>;

/// A generic store of typed, versioned records.
///
/// This is the only surface the relay depends on. Implementations decide
/// durability, ordering across ids, and what deleting a missing id means.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Creates or overwrites the record `(record_type, id)`.
    ///
    /// Returns the version assigned to the write.
    async fn put(&self, record_type: &str, id: &str, payload: Bytes) -> StoreResult<u64>;

    /// Removes the record `(record_type, id)`.
    async fn delete(&self, record_type: &str, id: &str) -> StoreResult<()>;

    /// Opens a change stream for `record_type` starting after `cursor`.
    ///
    /// A zero cursor, or one from another epoch, replays from the start.
    /// The stream yields non-empty batches until dropped or failed.
    async fn open_sync(&self, record_type: &str, cursor: Cursor) -> StoreResult<BatchStream>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn put(&self, record_type: &str, id: &str, payload: Bytes) -> StoreResult<u64> {
        (**self).put(record_type, id, payload).await
    }

    async fn delete(&self, record_type: &str, id: &str) -> StoreResult<()> {
        (**self).delete(record_type, id).await
    }

    async fn open_sync(&self, record_type: &str, cursor: Cursor) -> StoreResult<BatchStream> {
        (**self).open_sync(record_type, cursor).await
    }
}

//! The session relay.

use bytes::Bytes;
use relay_protocol::{Cursor, Session, TypedMessage};
use relay_store::RecordStore;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::error::RelayResult;
use crate::sync::{self, SessionSyncStream};

/// Typed add, delete and sync of sessions over a [`RecordStore`].
///
/// The relay holds no state between calls. Every session is stored as a
/// record of type [`Session::TYPE_URL`] keyed by the session id.
///
/// # Example
///
/// ```
/// use futures::StreamExt;
/// use relay_protocol::{Cursor, Session};
/// use relay_server::SessionRelay;
/// use relay_store::MemoryRecordStore;
///
/// # async fn demo() -> relay_server::RelayResult<()> {
/// let relay = SessionRelay::new(MemoryRecordStore::new());
/// relay.add(&Session::new("u1").with_field("user", "alice")).await?;
///
/// let mut stream = relay.sync(Cursor::ZERO).await?;
/// if let Some(reply) = stream.next().await {
///     let reply = reply?;
///     assert_eq!(reply.sessions[0].id, "u1");
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionRelay<S: RecordStore> {
    store: S,
    config: RelayConfig,
}

impl<S: RecordStore> SessionRelay<S> {
    /// Creates a relay with default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, RelayConfig::default())
    }

    /// Creates a relay.
    pub fn with_config(store: S, config: RelayConfig) -> Self {
        Self { store, config }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The relay configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Stores `session`, replacing any session with the same id.
    ///
    /// A session that cannot be encoded fails here and never reaches the
    /// store, so everything stored decodes again on sync.
    pub async fn add(&self, session: &Session) -> RelayResult<()> {
        let payload = session.to_payload()?;
        let version = self
            .store
            .put(Session::TYPE_URL, &session.id, Bytes::from(payload))
            .await?;
        tracing::debug!(store = %self.config.store_name, id = %session.id, version, "session added");
        Ok(())
    }

    /// Removes the session `id`.
    ///
    /// The delete always reaches the store; a missing id fails only if the
    /// store says so. Whether open or resumed sync streams learn of the
    /// removal is up to the store; [`MemoryRecordStore`](relay_store::MemoryRecordStore)
    /// does not announce it.
    pub async fn delete(&self, id: &str) -> RelayResult<()> {
        self.store.delete(Session::TYPE_URL, id).await?;
        tracing::debug!(store = %self.config.store_name, id, "session deleted");
        Ok(())
    }

    /// Opens a session change stream after `cursor`.
    ///
    /// Failing to open the store stream is returned here; later failures
    /// arrive as the stream's last item.
    pub async fn sync(&self, cursor: Cursor) -> RelayResult<SessionSyncStream> {
        self.sync_with_token(cursor, CancellationToken::new()).await
    }

    /// Like [`sync`](Self::sync), also stopping when `token` is cancelled.
    ///
    /// Dropping the returned stream does not cancel `token` itself.
    pub async fn sync_with_token(
        &self,
        cursor: Cursor,
        token: CancellationToken,
    ) -> RelayResult<SessionSyncStream> {
        let store_stream = self.store.open_sync(Session::TYPE_URL, cursor).await?;
        tracing::info!(store = %self.config.store_name, %cursor, "session sync opened");

        let (task, stream) = sync::channel(
            store_stream,
            token.child_token(),
            self.config.sync_channel_capacity,
            self.config.store_name.clone(),
        );
        tokio::spawn(task.run());
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, RelayError};
    use crate::sync::{SyncReply, SyncState, Termination};
    use relay_protocol::{Value, SESSION_TYPE_URL};
    use relay_store::{MockRecordStore, StoreBatch, StoreCall, StoreError, SyncScript};
    use relay_testkit::{garbage_record, next_item, session_record as record, wait_for};
    use std::sync::Arc;
    use std::time::Duration;

    fn relay() -> (Arc<MockRecordStore>, SessionRelay<Arc<MockRecordStore>>) {
        let store = Arc::new(MockRecordStore::new());
        (Arc::clone(&store), SessionRelay::new(store))
    }

    async fn next(stream: &mut SessionSyncStream) -> Option<RelayResult<SyncReply>> {
        next_item(stream).await
    }

    #[tokio::test]
    async fn add_writes_typed_payload() {
        let (store, relay) = relay();
        let session = Session::new("u1").with_field("user", "alice");
        relay.add(&session).await.unwrap();

        let calls = store.calls();
        let [StoreCall::Put { record_type, id, payload }] = calls.as_slice() else {
            panic!("expected one put, got {calls:?}");
        };
        assert_eq!(record_type, SESSION_TYPE_URL);
        assert_eq!(id, "u1");
        assert_eq!(Session::from_payload(payload).unwrap(), session);
    }

    #[tokio::test]
    async fn add_unencodable_session_never_reaches_store() {
        let (store, relay) = relay();
        let err = relay.add(&Session::default()).await.unwrap_err();
        assert!(err.is_encoding());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn add_of_too_deep_session_never_reaches_store() {
        let (store, relay) = relay();
        let deep = (0..200).fold(Value::Null, |inner, _| Value::Array(vec![inner]));
        let err = relay
            .add(&Session::new("u1").with_field("deep", deep))
            .await
            .unwrap_err();
        assert!(err.is_encoding());
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn add_of_unsorted_raw_data_never_reaches_store() {
        let (store, relay) = relay();
        let mut session = Session::new("u1");
        session.data.insert(
            "m".into(),
            Value::Map(vec![
                (Value::from("zz"), Value::Null),
                (Value::from("a"), Value::Null),
            ]),
        );
        assert!(relay.add(&session).await.unwrap_err().is_encoding());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn add_surfaces_store_error() {
        let (store, relay) = relay();
        store.push_put_result(Err(StoreError::Unavailable("down".into())));
        let err = relay.add(&Session::new("u1")).await.unwrap_err();
        assert_eq!(err, RelayError::Store(StoreError::Unavailable("down".into())));
    }

    #[tokio::test]
    async fn delete_missing_surfaces_not_found() {
        let (store, relay) = relay();
        store.push_delete_result(Err(StoreError::not_found(SESSION_TYPE_URL, "u1")));
        let err = relay.delete("u1").await.unwrap_err();
        assert!(err.as_store().is_some_and(StoreError::is_not_found));
        assert_eq!(
            store.calls(),
            vec![StoreCall::Delete {
                record_type: SESSION_TYPE_URL.into(),
                id: "u1".into()
            }]
        );
    }

    #[tokio::test]
    async fn sync_open_failure_is_immediate() {
        let (store, relay) = relay();
        store.fail_next_open(StoreError::Unavailable("no leader".into()));
        let err = relay.sync(Cursor::ZERO).await.unwrap_err();
        assert_eq!(err.as_store(), Some(&StoreError::Unavailable("no leader".into())));
    }

    #[tokio::test]
    async fn sync_passes_cursor_and_type() {
        let (store, relay) = relay();
        let _stream = relay.sync(Cursor::new(4, 10)).await.unwrap();
        assert_eq!(
            store.calls(),
            vec![StoreCall::OpenSync {
                record_type: SESSION_TYPE_URL.into(),
                cursor: Cursor::new(4, 10)
            }]
        );
    }

    #[tokio::test]
    async fn sync_forwards_batches_in_order_with_server_version() {
        let (store, relay) = relay();
        store.push_sync(
            SyncScript::new()
                .batch(StoreBatch::new(
                    7,
                    vec![record(&Session::new("a"), 1), record(&Session::new("b"), 2)],
                ))
                .batch(StoreBatch::new(7, vec![record(&Session::new("c"), 5)])),
        );
        let mut stream = relay.sync(Cursor::ZERO).await.unwrap();

        let first = next(&mut stream).await.unwrap().unwrap();
        assert_eq!(first.cursor(), Cursor::new(7, 2));
        assert_eq!(first.sessions.len(), 2);
        let second = next(&mut stream).await.unwrap().unwrap();
        assert_eq!(second.server_version, 7);
        assert_eq!(second.sessions[0].id, "c");
        assert_eq!(stream.state(), SyncState::AwaitingBatch);
    }

    #[tokio::test]
    async fn decode_failure_terminates_after_good_batches() {
        let (store, relay) = relay();
        let bad = garbage_record("x", 3);
        store.push_sync(
            SyncScript::new()
                .batch(StoreBatch::new(1, vec![record(&Session::new("a"), 1)]))
                .batch(StoreBatch::new(1, vec![record(&Session::new("b"), 2), bad]))
                .batch(StoreBatch::new(1, vec![record(&Session::new("c"), 4)])),
        );
        let mut stream = relay.sync(Cursor::ZERO).await.unwrap();

        assert_eq!(next(&mut stream).await.unwrap().unwrap().sessions[0].id, "a");
        let err = next(&mut stream).await.unwrap().unwrap_err();
        assert!(matches!(err, RelayError::StreamDecode { ref id, version: 3, .. } if id == "x"));
        assert!(next(&mut stream).await.is_none());
        assert_eq!(
            stream.state(),
            SyncState::Terminated(Termination::DecodeFailed)
        );
        let probe = store.last_probe().unwrap();
        wait_for(|| probe.is_dropped()).await;
    }

    #[tokio::test]
    async fn store_error_ends_stream() {
        let (store, relay) = relay();
        store.push_sync(SyncScript::new().fail(StoreError::Internal("disk".into())));
        let mut stream = relay.sync(Cursor::ZERO).await.unwrap();
        let err = next(&mut stream).await.unwrap().unwrap_err();
        assert_eq!(err, RelayError::Store(StoreError::Internal("disk".into())));
        assert!(next(&mut stream).await.is_none());
        assert_eq!(stream.state(), SyncState::Terminated(Termination::StoreFailed));
    }

    #[tokio::test]
    async fn store_close_is_reported() {
        let (store, relay) = relay();
        store.push_sync(SyncScript::new().then_close());
        let mut stream = relay.sync(Cursor::ZERO).await.unwrap();
        let err = next(&mut stream).await.unwrap().unwrap_err();
        assert_eq!(err, RelayError::Store(StoreError::Closed));
        assert!(next(&mut stream).await.is_none());
        assert_eq!(stream.state(), SyncState::Terminated(Termination::StoreClosed));
    }

    #[tokio::test]
    async fn empty_batches_are_skipped() {
        let (store, relay) = relay();
        store.push_sync(
            SyncScript::new()
                .batch(StoreBatch::new(1, vec![]))
                .batch(StoreBatch::new(1, vec![record(&Session::new("a"), 9)])),
        );
        let mut stream = relay.sync(Cursor::ZERO).await.unwrap();
        let reply = next(&mut stream).await.unwrap().unwrap();
        assert_eq!(reply.cursor(), Cursor::new(1, 9));
    }

    #[tokio::test]
    async fn dropping_the_stream_releases_the_store_stream() {
        let (store, relay) = relay();
        let stream = relay.sync(Cursor::ZERO).await.unwrap();
        let probe = store.last_probe().unwrap();
        assert!(!probe.is_dropped());
        drop(stream);
        wait_for(|| probe.is_dropped()).await;
    }

    #[tokio::test]
    async fn external_token_cancels_sync() {
        let (store, relay) = relay();
        let token = CancellationToken::new();
        let mut stream = relay.sync_with_token(Cursor::ZERO, token.clone()).await.unwrap();
        token.cancel();
        assert!(next(&mut stream).await.is_none());
        assert_eq!(stream.state(), SyncState::Terminated(Termination::Cancelled));
        let probe = store.last_probe().unwrap();
        wait_for(|| probe.is_dropped()).await;
    }

    #[tokio::test]
    async fn dropping_stream_leaves_external_token_alone() {
        let (_store, relay) = relay();
        let token = CancellationToken::new();
        let stream = relay.sync_with_token(Cursor::ZERO, token.clone()).await.unwrap();
        drop(stream);
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn backpressure_holds_batches_in_the_store() {
        let store = Arc::new(MockRecordStore::new());
        let relay = SessionRelay::with_config(
            Arc::clone(&store),
            RelayConfig::new().with_sync_channel_capacity(1),
        );
        let mut script = SyncScript::new();
        for v in 1..=5 {
            script = script.batch(StoreBatch::new(
                1,
                vec![record(&Session::new(format!("s{v}")), v)],
            ));
        }
        store.push_sync(script);
        let mut stream = relay.sync(Cursor::ZERO).await.unwrap();
        let probe = store.last_probe().unwrap();

        // One reply buffered, one held by the blocked send.
        wait_for(|| probe.yielded() == 2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(probe.yielded(), 2);

        for v in 1..=5u64 {
            let reply = next(&mut stream).await.unwrap().unwrap();
            assert_eq!(reply.record_version, v);
        }
    }
}

//! The session sync stream.
//!
//! One spawned task per stream moves through [`SyncState`]: it awaits a
//! store batch, decodes it as a whole, and hands the reply to the caller
//! over a bounded channel. Both awaits race a shared cancellation token.
//! The first failure is delivered to the caller and ends the task.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use relay_protocol::{CodecError, Cursor, Session, SyncResponse};
use relay_store::{BatchStream, Record, StoreBatch, StoreError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::{RelayError, RelayResult};

/// Why a sync stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The caller went away or the token was cancelled.
    Cancelled,
    /// The store ended its stream.
    StoreClosed,
    /// The store reported an error.
    StoreFailed,
    /// A batch did not decode.
    DecodeFailed,
}

/// State of a sync stream's task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Waiting for the next store batch.
    AwaitingBatch,
    /// Finished; no more replies will be produced.
    Terminated(Termination),
}

impl SyncState {
    /// Returns true once the stream has stopped.
    pub fn is_terminated(&self) -> bool {
        matches!(self, SyncState::Terminated(_))
    }

    /// The termination reason, if stopped.
    pub fn termination(&self) -> Option<Termination> {
        match self {
            SyncState::Terminated(reason) => Some(*reason),
            SyncState::AwaitingBatch => None,
        }
    }
}

/// One decoded store batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReply {
    /// Server version of the batch, unchanged.
    pub server_version: u64,
    /// Store version of the last record in the batch.
    pub record_version: u64,
    /// Sessions in store order.
    pub sessions: Vec<Session>,
}

impl SyncReply {
    /// Cursor to resume from after this reply.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.server_version, self.record_version)
    }

    /// Converts into the wire response.
    pub fn into_response(self) -> SyncResponse {
        SyncResponse {
            server_version: self.server_version,
            record_version: self.record_version,
            sessions: self.sessions,
        }
    }
}

impl From<SyncReply> for SyncResponse {
    fn from(reply: SyncReply) -> Self {
        reply.into_response()
    }
}

fn stream_decode(record: &Record, source: CodecError) -> RelayError {
    RelayError::StreamDecode {
        id: record.id.clone(),
        version: record.version,
        source,
    }
}

/// Decodes every record of `batch` or none of them.
pub(crate) fn decode_batch(batch: &StoreBatch) -> RelayResult<SyncReply> {
    let sessions = batch
        .records
        .iter()
        .map(|record| {
            let session =
                Session::from_payload(&record.payload).map_err(|e| stream_decode(record, e))?;
            if session.id != record.id {
                return Err(stream_decode(
                    record,
                    CodecError::invalid_structure(format!(
                        "payload holds session {:?}",
                        session.id
                    )),
                ));
            }
            Ok(session)
        })
        .collect::<RelayResult<Vec<_>>>()?;

    Ok(SyncReply {
        server_version: batch.server_version,
        record_version: batch.last_version().unwrap_or_default(),
        sessions,
    })
}

/// The task behind one [`SessionSyncStream`].
pub(crate) struct SyncTask {
    store_stream: BatchStream,
    replies: mpsc::Sender<RelayResult<SyncReply>>,
    token: CancellationToken,
    state: watch::Sender<SyncState>,
    store_name: String,
}

impl SyncTask {
    /// Runs until terminated. The store stream is dropped on return.
    pub(crate) async fn run(mut self) -> Termination {
        loop {
            let next = self.step().await;
            self.state.send_replace(next);
            if let SyncState::Terminated(reason) = next {
                tracing::debug!(store = %self.store_name, ?reason, "session sync terminated");
                return reason;
            }
        }
    }

    async fn step(&mut self) -> SyncState {
        let next = tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                return SyncState::Terminated(Termination::Cancelled);
            }
            next = self.store_stream.next() => next,
        };

        let (outcome, end) = match next {
            None => (
                Err(RelayError::Store(StoreError::Closed)),
                Some(Termination::StoreClosed),
            ),
            Some(Err(err)) => {
                tracing::warn!(store = %self.store_name, error = %err, "store sync failed");
                (Err(RelayError::Store(err)), Some(Termination::StoreFailed))
            }
            Some(Ok(batch)) if batch.is_empty() => return SyncState::AwaitingBatch,
            Some(Ok(batch)) => match decode_batch(&batch) {
                Ok(reply) => {
                    tracing::debug!(
                        store = %self.store_name,
                        server_version = reply.server_version,
                        version = reply.record_version,
                        records = reply.sessions.len(),
                        "session batch decoded"
                    );
                    (Ok(reply), None)
                }
                Err(err) => {
                    tracing::warn!(store = %self.store_name, error = %err, "session batch rejected");
                    (Err(err), Some(Termination::DecodeFailed))
                }
            },
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                return SyncState::Terminated(Termination::Cancelled);
            }
            sent = self.replies.send(outcome) => {
                if sent.is_err() {
                    return SyncState::Terminated(Termination::Cancelled);
                }
            }
        }

        match end {
            Some(reason) => SyncState::Terminated(reason),
            None => SyncState::AwaitingBatch,
        }
    }
}

/// Builds a task and the caller's stream around one opened store stream.
pub(crate) fn channel(
    store_stream: BatchStream,
    token: CancellationToken,
    capacity: usize,
    store_name: String,
) -> (SyncTask, SessionSyncStream) {
    let (reply_tx, reply_rx) = mpsc::channel(capacity.max(1));
    let (state_tx, state_rx) = watch::channel(SyncState::AwaitingBatch);
    let task = SyncTask {
        store_stream,
        replies: reply_tx,
        token: token.clone(),
        state: state_tx,
        store_name,
    };
    let stream = SessionSyncStream {
        replies: reply_rx,
        state: state_rx,
        token: token.clone(),
        _guard: token.drop_guard(),
    };
    (task, stream)
}

/// A stream of decoded session batches.
///
/// Yields `Ok` replies in store order. The first `Err` is the last item.
/// Dropping the stream cancels the sync and releases the store stream.
#[derive(Debug)]
pub struct SessionSyncStream {
    replies: mpsc::Receiver<RelayResult<SyncReply>>,
    state: watch::Receiver<SyncState>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl SessionSyncStream {
    /// Current state of the sync task.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Stops the sync. Replies already buffered can still be read.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once the stream has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Stream for SessionSyncStream {
    type Item = RelayResult<SyncReply>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.replies.poll_recv(cx)
    }
}

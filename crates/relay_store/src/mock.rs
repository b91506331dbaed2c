//! Scriptable record store for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use relay_protocol::Cursor;

use crate::error::{StoreError, StoreResult};
use crate::record::StoreBatch;
use crate::store::{BatchStream, RecordStore};

/// A call observed by [`MockRecordStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `put(record_type, id, payload)`.
    Put {
        /// Record type.
        record_type: String,
        /// Record id.
        id: String,
        /// Payload written.
        payload: Bytes,
    },
    /// `delete(record_type, id)`.
    Delete {
        /// Record type.
        record_type: String,
        /// Record id.
        id: String,
    },
    /// `open_sync(record_type, cursor)`.
    OpenSync {
        /// Record type.
        record_type: String,
        /// Cursor passed by the caller.
        cursor: Cursor,
    },
}

/// What a scripted sync stream does after its items run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptEnd {
    /// Stay open without yielding, like an idle live feed.
    #[default]
    Hang,
    /// End the stream.
    Close,
}

/// Items a scripted sync stream yields.
#[derive(Debug, Clone, Default)]
pub struct SyncScript {
    items: Vec<StoreResult<StoreBatch>>,
    end: ScriptEnd,
}

impl SyncScript {
    /// Creates an empty script that hangs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a batch.
    pub fn batch(mut self, batch: StoreBatch) -> Self {
        self.items.push(Ok(batch));
        self
    }

    /// Appends a failure.
    pub fn fail(mut self, error: StoreError) -> Self {
        self.items.push(Err(error));
        self
    }

    /// Ends the stream after the scripted items.
    pub fn then_close(mut self) -> Self {
        self.end = ScriptEnd::Close;
        self
    }
}

/// Tracks one opened stream.
#[derive(Debug, Clone, Default)]
pub struct StreamProbe {
    dropped: Arc<AtomicBool>,
    polled: Arc<AtomicUsize>,
}

impl StreamProbe {
    /// Returns true once the stream has been dropped.
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Number of items the stream has yielded.
    pub fn yielded(&self) -> usize {
        self.polled.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A record store that records calls and returns scripted results.
///
/// Writes succeed with increasing versions unless a result has been queued.
/// `open_sync` pops the next [`SyncScript`]; with none queued the stream
/// hangs.
#[derive(Default)]
pub struct MockRecordStore {
    calls: Mutex<Vec<StoreCall>>,
    put_results: Mutex<VecDeque<StoreResult<u64>>>,
    delete_results: Mutex<VecDeque<StoreResult<()>>>,
    scripts: Mutex<VecDeque<SyncScript>>,
    open_error: Mutex<Option<StoreError>>,
    probes: Mutex<Vec<StreamProbe>>,
    next_version: AtomicUsize,
}

impl MockRecordStore {
    /// Creates a mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of the next `put`.
    pub fn push_put_result(&self, result: StoreResult<u64>) {
        self.put_results.lock().push_back(result);
    }

    /// Queues the result of the next `delete`.
    pub fn push_delete_result(&self, result: StoreResult<()>) {
        self.delete_results.lock().push_back(result);
    }

    /// Queues the stream returned by the next `open_sync`.
    pub fn push_sync(&self, script: SyncScript) {
        self.scripts.lock().push_back(script);
    }

    /// Makes the next `open_sync` fail.
    pub fn fail_next_open(&self, error: StoreError) {
        *self.open_error.lock() = Some(error);
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Probes for every stream opened so far, in open order.
    pub fn probes(&self) -> Vec<StreamProbe> {
        self.probes.lock().clone()
    }

    /// Probe for the most recently opened stream.
    pub fn last_probe(&self) -> Option<StreamProbe> {
        self.probes.lock().last().cloned()
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn put(&self, record_type: &str, id: &str, payload: Bytes) -> StoreResult<u64> {
        self.calls.lock().push(StoreCall::Put {
            record_type: record_type.to_string(),
            id: id.to_string(),
            payload,
        });
        match self.put_results.lock().pop_front() {
            Some(result) => result,
            None => Ok(self.next_version.fetch_add(1, Ordering::SeqCst) as u64 + 1),
        }
    }

    async fn delete(&self, record_type: &str, id: &str) -> StoreResult<()> {
        self.calls.lock().push(StoreCall::Delete {
            record_type: record_type.to_string(),
            id: id.to_string(),
        });
        self.delete_results.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn open_sync(&self, record_type: &str, cursor: Cursor) -> StoreResult<BatchStream> {
        self.calls.lock().push(StoreCall::OpenSync {
            record_type: record_type.to_string(),
            cursor,
        });
        if let Some(error) = self.open_error.lock().take() {
            return Err(error);
        }

        let script = self.scripts.lock().pop_front().unwrap_or_default();
        let probe = StreamProbe::default();
        self.probes.lock().push(probe.clone());

        let flag = DropFlag(Arc::clone(&probe.dropped));
        let polled = Arc::clone(&probe.polled);
        let items = stream::iter(script.items).map(move |item| {
            let _held = &flag;
            polled.fetch_add(1, Ordering::SeqCst);
            item
        });

        Ok(match script.end {
            ScriptEnd::Hang => items.chain(stream::pending()).boxed(),
            ScriptEnd::Close => items.boxed(),
        })
    }
}

//! In-memory record store.
//!
//! Keeps every record in a map and fans committed writes out to open sync
//! streams over a broadcast channel. Versions are store-wide: every put or
//! delete consumes the next one, starting at 1.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use relay_protocol::Cursor;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::{StoreError, StoreResult};
use crate::record::{Record, StoreBatch};
use crate::store::{BatchStream, RecordStore};

/// Configuration for [`MemoryRecordStore`].
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Epoch reported to sync streams.
    pub server_version: u64,
    /// Maximum records per history batch.
    pub max_batch: usize,
    /// Live changes buffered per subscriber before it is dropped as lagging.
    pub live_buffer: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            server_version: 1,
            max_batch: 100,
            live_buffer: 1024,
        }
    }
}

impl MemoryStoreConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the starting epoch.
    pub fn with_server_version(mut self, server_version: u64) -> Self {
        self.server_version = server_version;
        self
    }

    /// Sets the history batch size. Values below 1 are raised to 1.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// Sets the live buffer size. Values below 1 are raised to 1.
    pub fn with_live_buffer(mut self, live_buffer: usize) -> Self {
        self.live_buffer = live_buffer.max(1);
        self
    }
}

#[derive(Debug, Clone)]
struct Committed {
    server_version: u64,
    record: Record,
}

#[derive(Debug)]
struct Inner {
    server_version: u64,
    next_version: u64,
    records: HashMap<(String, String), Record>,
}

/// A record store held entirely in memory.
///
/// Deletes are hard removals. A delete consumes a version but produces
/// no record, so sync streams never hear about it: a live stream stays
/// silent, and a stream resumed from a cursor taken before the delete
/// replays only later writes. A caller that keeps a view built from sync
/// replies therefore still holds deleted records until it resyncs from
/// [`Cursor::ZERO`], or until [`compact`](Self::compact) moves the epoch
/// and its stale cursor replays everything.
#[derive(Debug)]
pub struct MemoryRecordStore {
    config: MemoryStoreConfig,
    inner: RwLock<Inner>,
    live: broadcast::Sender<Committed>,
    active_syncs: Arc<AtomicUsize>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    /// Creates an empty store with default configuration.
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    /// Creates an empty store.
    pub fn with_config(config: MemoryStoreConfig) -> Self {
        let (live, _) = broadcast::channel(config.live_buffer.max(1));
        Self {
            inner: RwLock::new(Inner {
                server_version: config.server_version,
                next_version: 1,
                records: HashMap::new(),
            }),
            config,
            live,
            active_syncs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates an empty store at the given epoch.
    pub fn with_server_version(server_version: u64) -> Self {
        Self::with_config(MemoryStoreConfig::default().with_server_version(server_version))
    }

    /// Current epoch.
    pub fn server_version(&self) -> u64 {
        self.inner.read().server_version
    }

    /// Version of the most recent write or delete, or zero.
    pub fn latest_version(&self) -> u64 {
        self.inner.read().next_version - 1
    }

    /// Returns the stored record for `(record_type, id)`.
    pub fn get(&self, record_type: &str, id: &str) -> Option<Record> {
        self.inner
            .read()
            .records
            .get(&(record_type.to_string(), id.to_string()))
            .cloned()
    }

    /// Number of stored records across all types.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Returns true if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of sync streams currently open.
    pub fn active_syncs(&self) -> usize {
        self.active_syncs.load(Ordering::SeqCst)
    }

    /// Starts a new epoch.
    ///
    /// Cursors from earlier epochs replay from the start on their next
    /// `open_sync`. Returns the new server version.
    pub fn compact(&self) -> u64 {
        let mut inner = self.inner.write();
        inner.server_version += 1;
        tracing::info!(server_version = inner.server_version, "record store compacted");
        inner.server_version
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, record_type: &str, id: &str, payload: Bytes) -> StoreResult<u64> {
        if id.is_empty() {
            return Err(StoreError::InvalidArgument("record id is empty".into()));
        }

        let mut inner = self.inner.write();
        let version = inner.next_version;
        inner.next_version += 1;

        let record = Record::new(record_type, id, payload, version);
        inner
            .records
            .insert((record_type.to_string(), id.to_string()), record.clone());

        // Sent under the write lock so live order matches version order.
        let _ = self.live.send(Committed {
            server_version: inner.server_version,
            record,
        });

        tracing::debug!(record_type, id, version, "record written");
        Ok(version)
    }

    async fn delete(&self, record_type: &str, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner
            .records
            .remove(&(record_type.to_string(), id.to_string()))
            .is_none()
        {
            tracing::debug!(record_type, id, "delete of missing record");
            return Err(StoreError::not_found(record_type, id));
        }
        let version = inner.next_version;
        inner.next_version += 1;

        tracing::debug!(record_type, id, version, "record deleted");
        Ok(())
    }

    async fn open_sync(&self, record_type: &str, cursor: Cursor) -> StoreResult<BatchStream> {
        // Subscribe before taking the snapshot so no commit falls between them.
        let receiver = self.live.subscribe();

        let (server_version, watermark, history) = {
            let inner = self.inner.read();
            let from = if cursor.is_valid_for(inner.server_version) {
                cursor.record_version
            } else {
                0
            };
            let mut history: Vec<Record> = inner
                .records
                .values()
                .filter(|r| r.record_type == record_type && r.version > from)
                .cloned()
                .collect();
            history.sort_by_key(|r| r.version);
            (inner.server_version, inner.next_version - 1, history)
        };

        tracing::info!(
            record_type,
            %cursor,
            server_version,
            history = history.len(),
            "sync stream opened"
        );

        let batches: Vec<StoreResult<StoreBatch>> = history
            .chunks(self.config.max_batch.max(1))
            .map(|chunk| Ok(StoreBatch::new(server_version, chunk.to_vec())))
            .collect();

        self.active_syncs.fetch_add(1, Ordering::SeqCst);
        let live = LiveFeed {
            receiver,
            record_type: record_type.to_string(),
            watermark,
            failed: false,
            _guard: SubscriptionGuard {
                active: Arc::clone(&self.active_syncs),
                record_type: record_type.to_string(),
            },
        };

        Ok(stream::iter(batches).chain(live.into_stream()).boxed())
    }
}

struct LiveFeed {
    receiver: broadcast::Receiver<Committed>,
    record_type: String,
    watermark: u64,
    failed: bool,
    _guard: SubscriptionGuard,
}

impl LiveFeed {
    fn into_stream(self) -> impl futures::Stream<Item = StoreResult<StoreBatch>> + Send {
        stream::unfold(self, |mut feed| async move {
            if feed.failed {
                return None;
            }
            loop {
                match feed.receiver.recv().await {
                    Ok(committed) => {
                        let record = committed.record;
                        if record.record_type != feed.record_type
                            || record.version <= feed.watermark
                        {
                            continue;
                        }
                        let batch = StoreBatch::new(committed.server_version, vec![record]);
                        return Some((Ok(batch), feed));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            record_type = %feed.record_type,
                            skipped,
                            "sync subscriber lagged"
                        );
                        feed.failed = true;
                        let err = StoreError::Unavailable(format!(
                            "sync subscriber fell behind by {skipped} changes"
                        ));
                        return Some((Err(err), feed));
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }
}

struct SubscriptionGuard {
    active: Arc<AtomicUsize>,
    record_type: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(record_type = %self.record_type, "sync stream closed");
    }
}

//! Records and change batches.

use bytes::Bytes;

/// A typed, versioned record.
///
/// `(record_type, id)` is the identity key. `version` is assigned by the
/// store on every write and never changed by anyone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Type identifier of the payload.
    pub record_type: String,
    /// Record id, unique within `record_type`.
    pub id: String,
    /// Opaque payload.
    pub payload: Bytes,
    /// Store-assigned version.
    pub version: u64,
}

impl Record {
    /// Creates a record.
    pub fn new(
        record_type: impl Into<String>,
        id: impl Into<String>,
        payload: impl Into<Bytes>,
        version: u64,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            id: id.into(),
            payload: payload.into(),
            version,
        }
    }
}

/// One unit of a sync stream: changed records under a server version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreBatch {
    /// Epoch the records belong to.
    pub server_version: u64,
    /// Changed records in store order.
    pub records: Vec<Record>,
}

impl StoreBatch {
    /// Creates a batch.
    pub fn new(server_version: u64, records: Vec<Record>) -> Self {
        Self {
            server_version,
            records,
        }
    }

    /// Version of the last record, if any.
    pub fn last_version(&self) -> Option<u64> {
        self.records.last().map(|r| r.version)
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

//! Synchronization positions.

use std::fmt;

/// A position in the store's change log.
///
/// `server_version` names an epoch of the log; a store restart or
/// compaction starts a new epoch and invalidates cursors from the old one.
/// `record_version` is the last record version observed within the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cursor {
    /// Epoch of the store's change log.
    pub server_version: u64,
    /// Last record version seen in that epoch.
    pub record_version: u64,
}

impl Cursor {
    /// The cursor requesting a full resync.
    pub const ZERO: Cursor = Cursor {
        server_version: 0,
        record_version: 0,
    };

    /// Creates a cursor.
    pub const fn new(server_version: u64, record_version: u64) -> Self {
        Self {
            server_version,
            record_version,
        }
    }

    /// Returns true for the full-resync cursor.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Returns true if this cursor can resume within `server_version`.
    pub fn is_valid_for(&self, server_version: u64) -> bool {
        !self.is_zero() && self.server_version == server_version
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server_version, self.record_version)
    }
}

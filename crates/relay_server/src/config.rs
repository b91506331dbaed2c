//! Relay configuration.

/// Default capacity of the per-stream reply channel.
pub const DEFAULT_SYNC_CHANNEL_CAPACITY: usize = 16;

/// Configuration for [`SessionRelay`](crate::SessionRelay).
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Replies buffered per sync stream before the sync task waits.
    pub sync_channel_capacity: usize,
    /// Label for the store, attached to log events.
    pub store_name: String,
}

impl RelayConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            sync_channel_capacity: DEFAULT_SYNC_CHANNEL_CAPACITY,
            store_name: "records".into(),
        }
    }

    /// Sets the reply channel capacity. Values below 1 are raised to 1.
    pub fn with_sync_channel_capacity(mut self, capacity: usize) -> Self {
        self.sync_channel_capacity = capacity.max(1);
        self
    }

    /// Sets the store label.
    pub fn with_store_name(mut self, name: impl Into<String>) -> Self {
        self.store_name = name.into();
        self
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

//! Error types reported by record stores.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a record store.
///
/// Callers above the store pass these through unchanged, so the messages
/// should carry whatever detail the store has.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record exists for the key.
    #[error("record not found: {record_type}/{id}")]
    NotFound {
        /// Record type.
        record_type: String,
        /// Record id.
        id: String,
    },

    /// The write conflicted with concurrent state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store cannot serve the request right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The call was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// A sync stream ended.
    #[error("sync stream closed by store")]
    Closed,

    /// Internal store failure.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            record_type: record_type.into(),
            id: id.into(),
        }
    }

    /// Returns true if repeating the call later may succeed.
    ///
    /// The relay never retries; this is for its callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Closed)
    }

    /// Returns true for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(StoreError::Unavailable("restarting".into()).is_retryable());
        assert!(StoreError::Closed.is_retryable());
        assert!(!StoreError::Conflict("version".into()).is_retryable());
        assert!(!StoreError::not_found("t", "u1").is_retryable());
        assert!(!StoreError::Cancelled.is_retryable());
    }

    #[test]
    fn not_found_display_names_key() {
        let err = StoreError::not_found("type.relay.dev/relay.session.Session", "u1");
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "record not found: type.relay.dev/relay.session.Session/u1"
        );
    }
}

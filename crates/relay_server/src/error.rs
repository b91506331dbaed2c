//! Error types for the session relay.

use relay_protocol::CodecError;
use relay_store::StoreError;
use thiserror::Error;

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors surfaced by the relay.
///
/// Nothing here is retried by the relay itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A session could not be encoded or a request could not be decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] CodecError),

    /// A record in a sync batch did not decode as a session.
    #[error("sync batch rejected at record {id} (version {version}): {source}")]
    StreamDecode {
        /// Id of the offending record.
        id: String,
        /// Store version of the offending record.
        version: u64,
        /// Underlying decode failure.
        source: CodecError,
    },

    /// The record store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The message is not valid in this position.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
}

/// Transport-neutral status for a [`RelayError`].
///
/// An RPC layer maps these onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The caller sent something malformed.
    InvalidArgument,
    /// The addressed record does not exist.
    NotFound,
    /// A concurrent write won.
    Aborted,
    /// Try again later.
    Unavailable,
    /// The call was cancelled.
    Cancelled,
    /// Stored data could not be read back.
    DataLoss,
    /// Anything else.
    Internal,
}

impl RelayError {
    /// Returns true for encode or decode failures, including mid-sync ones.
    pub fn is_encoding(&self) -> bool {
        matches!(
            self,
            RelayError::Encoding(_) | RelayError::StreamDecode { .. }
        )
    }

    /// Returns the store error, if this is one.
    pub fn as_store(&self) -> Option<&StoreError> {
        match self {
            RelayError::Store(err) => Some(err),
            _ => None,
        }
    }

    /// Maps the error onto a transport-neutral code.
    pub fn code(&self) -> ErrorCode {
        match self {
            RelayError::Encoding(_) | RelayError::UnexpectedMessage(_) => {
                ErrorCode::InvalidArgument
            }
            RelayError::StreamDecode { .. } => ErrorCode::DataLoss,
            RelayError::Store(err) => match err {
                StoreError::NotFound { .. } => ErrorCode::NotFound,
                StoreError::Conflict(_) => ErrorCode::Aborted,
                StoreError::InvalidArgument(_) => ErrorCode::InvalidArgument,
                StoreError::Unavailable(_) | StoreError::Closed => ErrorCode::Unavailable,
                StoreError::Cancelled => ErrorCode::Cancelled,
                StoreError::Internal(_) => ErrorCode::Internal,
            },
        }
    }
}

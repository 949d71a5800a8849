//! Error types for LightStore core.

use lightstore_codec::CodecError;
use lightstore_engine::EngineError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that can occur in repository operations.
///
/// Only [`RepositoryError::CapacityExceeded`] is ever handled internally (by
/// autogrowth); every other error reaches the caller unchanged.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Key not present.
    #[error("key not found")]
    NotFound,

    /// The write does not fit the mapped region.
    #[error("capacity exceeded: the write does not fit the mapped region")]
    CapacityExceeded,

    /// The mapped region cannot grow any further.
    #[error("storage exhausted: cannot grow map beyond {current} bytes")]
    StorageExhausted {
        /// Map size when growth was refused.
        current: usize,
        /// The size growth asked for, if one could be computed.
        requested: Option<usize>,
        /// Engine failure behind the refusal, if any.
        #[source]
        source: Option<EngineError>,
    },

    /// The engine has no free transaction slot.
    #[error("transaction limit exceeded: no free reader slot")]
    TransactionLimitExceeded,

    /// The transaction was already committed or closed.
    #[error("transaction is closed")]
    TransactionClosed,

    /// Write or commit attempted on a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnlyTransaction,

    /// The store could not be opened.
    #[error("storage unavailable at {}: {source}", .path.display())]
    EngineUnavailable {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying engine failure.
        #[source]
        source: EngineError,
    },

    /// In-flight transactions kept a growth step from running.
    #[error("timed out after {waited:?} waiting to grow the map")]
    GrowthTimeout {
        /// How long the growth step waited.
        waited: Duration,
    },

    /// Storage engine error.
    #[error("engine error: {0}")]
    Engine(#[source] EngineError),

    /// Key or value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl RepositoryError {
    /// Creates a storage exhausted error.
    pub fn storage_exhausted(
        current: usize,
        requested: Option<usize>,
        source: Option<EngineError>,
    ) -> Self {
        Self::StorageExhausted {
            current,
            requested,
            source,
        }
    }

    /// Returns `true` for [`RepositoryError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns `true` for errors autogrowth recovers from.
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::CapacityExceeded)
    }
}

impl From<EngineError> for RepositoryError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MapFull => Self::CapacityExceeded,
            EngineError::ReadersFull => Self::TransactionLimitExceeded,
            EngineError::ReadOnlyTxn => Self::ReadOnlyTransaction,
            EngineError::ResizeFailed { requested, .. } => Self::StorageExhausted {
                current: 0,
                requested: Some(requested),
                source: Some(err),
            },
            other => Self::Engine(other),
        }
    }
}

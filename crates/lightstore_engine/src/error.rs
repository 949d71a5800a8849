//! Error types for engine operations.

use heed::MdbError;
use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur inside a storage engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The mapped region is too small for the write.
    #[error("map full: the mapped region cannot hold the write")]
    MapFull,

    /// Another process grew the map; this process must adopt the new size.
    #[error("map resized by another process")]
    MapResized,

    /// All reader slots are taken.
    #[error("reader slots exhausted")]
    ReadersFull,

    /// The environment is corrupted.
    #[error("environment corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// The environment was written by an incompatible engine version.
    #[error("incompatible environment: {message}")]
    Incompatible {
        /// Description of the incompatibility.
        message: String,
    },

    /// Growing the mapped region failed.
    #[error("cannot resize map to {requested} bytes: {message}")]
    ResizeFailed {
        /// The size that was asked for.
        requested: usize,
        /// Why the resize failed.
        message: String,
    },

    /// The default table does not exist yet.
    #[error("default table missing")]
    TableMissing,

    /// The key is empty or longer than [`crate::MAX_KEY_SIZE`].
    #[error("invalid key of {len} bytes (must be 1..={max})", max = crate::MAX_KEY_SIZE)]
    InvalidKey {
        /// Length of the rejected key.
        len: usize,
    },

    /// A write was issued on a read-only transaction.
    #[error("write on a read-only transaction")]
    ReadOnlyTxn,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other LMDB failure.
    #[error("lmdb error: {0}")]
    Lmdb(#[source] heed::Error),
}

impl EngineError {
    /// Creates a resize failed error.
    pub fn resize_failed(requested: usize, message: impl Into<String>) -> Self {
        Self::ResizeFailed {
            requested,
            message: message.into(),
        }
    }

    /// Returns `true` when the failure is a full map.
    #[must_use]
    pub fn is_map_full(&self) -> bool {
        matches!(self, Self::MapFull)
    }
}

impl From<heed::Error> for EngineError {
    fn from(err: heed::Error) -> Self {
        match err {
            heed::Error::Mdb(MdbError::MapFull) => Self::MapFull,
            heed::Error::Mdb(MdbError::MapResized) => Self::MapResized,
            heed::Error::Mdb(MdbError::ReadersFull) => Self::ReadersFull,
            heed::Error::Mdb(e @ (MdbError::Corrupted | MdbError::PageNotFound)) => {
                Self::Corrupted {
                    message: e.to_string(),
                }
            }
            heed::Error::Mdb(e @ (MdbError::VersionMismatch | MdbError::Invalid)) => {
                Self::Incompatible {
                    message: e.to_string(),
                }
            }
            heed::Error::Io(e) => Self::Io(e),
            other => Self::Lmdb(other),
        }
    }
}

//! # LightStore Core
//!
//! Typed, transactional key-value repositories over an embedded
//! memory-mapped storage engine.
//!
//! This crate provides:
//! - [`Repository`] - typed get/put/delete/list over pluggable codecs
//! - [`Transaction`] - snapshot-isolated units of work with an explicit lifecycle
//! - Autogrowth - writes that overflow the mapped region grow it and are replayed
//! - Lazy iteration - [`Entries`] and [`Values`] pull from one snapshot on demand
//!
//! ## Example
//!
//! ```rust
//! use lightstore_core::{Repository, RepositorySettings, StringCodec, U64Codec};
//!
//! let settings = RepositorySettings::new("unused", StringCodec, U64Codec)
//!     .initial_map_size(1024);
//! let repo = Repository::open_in_memory(settings).unwrap();
//!
//! repo.put_many((0..100u64).map(|i| (format!("item-{i:03}"), i))).unwrap();
//! assert_eq!(repo.count().unwrap(), 100);
//! assert!(repo.growth_events() > 0);
//!
//! let mut txn = repo.begin_transaction(false).unwrap();
//! txn.delete(&"item-000".to_string()).unwrap();
//! txn.commit().unwrap();
//!
//! let first = repo.list().unwrap().next().unwrap().unwrap();
//! assert_eq!(first, ("item-001".to_string(), 1));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod autogrowth;
mod config;
mod error;
mod iter;
mod repository;
mod stats;
mod transaction;

pub use config::{GrowthStrategy, RepositorySettings};
pub use error::{RepositoryError, RepositoryResult};
pub use iter::{Entries, Values};
pub use repository::Repository;
pub use stats::RepositoryStats;
pub use transaction::{Transaction, TransactionState};

// Re-export codec and engine types for convenience
pub use lightstore_codec::{BytesCodec, CborCodec, Codec, CodecError, StringCodec, U64Codec};
pub use lightstore_engine::{
    EngineError, EngineOptions, InMemoryEngine, LmdbEngine, StorageEngine, TxnMode, MAX_KEY_SIZE,
};

/// Version of the LightStore core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

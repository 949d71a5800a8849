//! # LightStore Engine
//!
//! Storage engine boundary for LightStore.
//!
//! The repository layer never talks to a storage engine directly. It talks to
//! the [`StorageEngine`] / [`EngineTxn`] capability set defined here: an
//! environment that hands out snapshot-isolated transactions over one default
//! table of ordered byte keys.
//!
//! ## Design Principles
//!
//! - Engines store **opaque bytes**, ordered by key bytes
//! - At most one write transaction is live per environment
//! - Readers never block writers and see a stable snapshot
//! - Growing the mapped region is an explicit, caller-serialised operation
//!
//! ## Available Engines
//!
//! - [`LmdbEngine`] - Memory-mapped B+tree storage through LMDB
//! - [`InMemoryEngine`] - For testing; simulates map capacity and reader slots
//!
//! ## Example
//!
//! ```rust
//! use lightstore_engine::{EngineOptions, EngineTxn, InMemoryEngine, StorageEngine, TxnMode};
//!
//! let engine = InMemoryEngine::new(EngineOptions::default());
//! let mut txn = engine.begin_txn(TxnMode::ReadWrite).unwrap();
//! let table = txn.open_default_table().unwrap();
//! txn.put(table, b"hello", b"world").unwrap();
//! txn.commit().unwrap();
//!
//! let txn = engine.begin_txn(TxnMode::ReadOnly).unwrap();
//! assert_eq!(txn.get(table, b"hello").unwrap(), Some(b"world".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod lmdb;
mod memory;
mod options;

pub use engine::{is_storable_key, EngineTxn, KeyValue, StorageEngine, TxnMode, MAX_KEY_SIZE};
pub use error::{EngineError, EngineResult};
pub use lmdb::{LmdbEngine, LmdbTable, LmdbTxn, MAP_SIZE_ALIGNMENT};
pub use memory::{InMemoryEngine, InMemoryTable, InMemoryTxn, ENTRY_OVERHEAD};
pub use options::EngineOptions;

//! Storage engine trait definitions.

use crate::error::EngineResult;
use std::path::Path;

/// An encoded key/value pair as stored by an engine.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Largest key, in bytes, an engine accepts on `put`.
///
/// This is LMDB's compiled-in limit; every engine enforces it so that the
/// adapters agree.
pub const MAX_KEY_SIZE: usize = 511;

/// Returns `true` if `key` may be stored: non-empty and at most
/// [`MAX_KEY_SIZE`] bytes.
#[must_use]
pub const fn is_storable_key(key: &[u8]) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_SIZE
}

/// Access mode of an engine transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnMode {
    /// Snapshot reader. Never blocks and is never blocked by the writer.
    ReadOnly,
    /// The single writer of the environment.
    ReadWrite,
}

impl TxnMode {
    /// Returns `true` for [`TxnMode::ReadOnly`].
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::ReadOnly)
    }
}

/// An embedded ACID key-value engine with one memory-mapped environment.
///
/// Engines are **opaque byte stores** ordered by key bytes. They do not know
/// about typed keys, values or codecs - the repository layer owns all of that.
///
/// # Invariants
///
/// - At most one [`TxnMode::ReadWrite`] transaction is live at any instant;
///   beginning a second one blocks until the first finishes
/// - A read transaction sees the state committed before it began, for its
///   whole lifetime
/// - Growing the map never invalidates committed data
/// - Engines must be `Send + Sync` so a repository can be shared across threads
/// - Only keys passing [`is_storable_key`] are ever stored. `put` rejects any
///   other key with `InvalidKey`; `get` and `delete` treat it as absent
///
/// # Implementors
///
/// - [`super::LmdbEngine`] - For persistent storage
/// - [`super::InMemoryEngine`] - For testing
pub trait StorageEngine: Send + Sync + 'static {
    /// Handle to the default table. Valid for the engine's whole lifetime.
    type Table: Copy + Send + Sync + 'static;

    /// A transaction borrowing the engine.
    type Txn<'e>: EngineTxn<Table = Self::Table>
    where
        Self: 'e;

    /// Begins a transaction in the given mode.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No reader slot is free (`ReadersFull`)
    /// - Another process grew the map since it was last adopted (`MapResized`)
    /// - The engine fails for any other reason
    fn begin_txn(&self, mode: TxnMode) -> EngineResult<Self::Txn<'_>>;

    /// Returns the current size of the mapped region in bytes.
    fn map_size(&self) -> usize;

    /// Resizes the mapped region to at least `new_size` bytes.
    ///
    /// Returns the size actually applied, which may be rounded up.
    ///
    /// The caller must guarantee that no transaction of this process is live
    /// while the resize runs.
    ///
    /// # Errors
    ///
    /// Returns `ResizeFailed` if the region cannot be grown.
    fn resize(&self, new_size: usize) -> EngineResult<usize>;

    /// Returns the on-disk location of the environment, if any.
    fn path(&self) -> Option<&Path>;

    /// Closes the environment, waiting for the engine to release its resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to flush or unmap.
    fn close(self) -> EngineResult<()>
    where
        Self: Sized,
    {
        drop(self);
        Ok(())
    }
}

/// One engine transaction over the default table.
///
/// Dropping a transaction without calling [`EngineTxn::commit`] aborts it.
pub trait EngineTxn: Sized {
    /// Table handle type this transaction operates on.
    type Table: Copy;

    /// Returns the mode the transaction was started in.
    fn mode(&self) -> TxnMode;

    /// Obtains the default table handle.
    ///
    /// # Errors
    ///
    /// Returns `TableMissing` when a read transaction runs against an
    /// environment whose default table was never created.
    fn open_default_table(&mut self) -> EngineResult<Self::Table>;

    /// Looks up `key`. A key that cannot be stored is simply absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine read fails.
    fn get(&self, table: Self::Table, key: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    /// Inserts or overwrites `key`.
    ///
    /// # Errors
    ///
    /// Returns `MapFull` when the mapped region cannot hold the write, and
    /// `InvalidKey` when `key` is empty or longer than [`MAX_KEY_SIZE`].
    fn put(&mut self, table: Self::Table, key: &[u8], value: &[u8]) -> EngineResult<()>;

    /// Removes `key`. Returns `true` if it existed; a key that cannot be
    /// stored never exists.
    ///
    /// # Errors
    ///
    /// Returns `MapFull` when the page rewrite does not fit the mapped region.
    fn delete(&mut self, table: Self::Table, key: &[u8]) -> EngineResult<bool>;

    /// Returns the number of entries visible to this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the table statistics cannot be read.
    fn count(&self, table: Self::Table) -> EngineResult<u64>;

    /// Returns up to `limit` pairs in ascending key order, starting strictly
    /// after `after` (or from the first key when `after` is `None`).
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor fails.
    fn scan(
        &self,
        table: Self::Table,
        after: Option<&[u8]>,
        limit: usize,
    ) -> EngineResult<Vec<KeyValue>>;

    /// Commits the transaction.
    ///
    /// For read transactions this simply releases the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `MapFull` when the write set does not fit the mapped region.
    fn commit(self) -> EngineResult<()>;

    /// Discards the transaction and everything it wrote.
    fn abort(self);
}

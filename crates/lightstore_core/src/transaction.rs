//! Typed transactions.

use crate::config::RepositorySettings;
use crate::error::{RepositoryError, RepositoryResult};
use crate::iter::Entries;
use lightstore_engine::{EngineResult, EngineTxn, KeyValue, StorageEngine};
use parking_lot::RwLockReadGuard;
use std::borrow::Borrow;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction was closed (read-only) or aborted (write).
    Closed,
}

/// A snapshot-isolated unit of work against a repository.
///
/// A transaction encodes typed keys and values through the repository's
/// codecs and runs the resulting byte operations on one engine transaction.
///
/// # Lifecycle
///
/// `Active` → `Committed` (write transactions, via [`Transaction::commit`]) or
/// `Active` → `Closed` (via [`Transaction::close`], a capacity failure, or a
/// failed commit). Both end states are final: every later call fails with
/// [`RepositoryError::TransactionClosed`].
///
/// Dropping an active transaction aborts it, so early returns and panics never
/// leak the engine's locks or reader slots.
///
/// # Example
///
/// ```rust,ignore
/// let mut txn = repo.begin_transaction(false)?;
/// txn.put(&"alice".to_string(), &30)?;
/// txn.delete(&"bob".to_string())?;
/// txn.commit()?;
/// ```
pub struct Transaction<'r, K, V, E: StorageEngine> {
    // Declared before `_gate`: the engine transaction must end first.
    txn: Option<E::Txn<'r>>,
    state: TransactionState,
    read_only: bool,
    table: E::Table,
    settings: &'r RepositorySettings<K, V>,
    _gate: RwLockReadGuard<'r, ()>,
}

impl<'r, K, V, E: StorageEngine> Transaction<'r, K, V, E> {
    pub(crate) fn new(
        txn: E::Txn<'r>,
        table: E::Table,
        settings: &'r RepositorySettings<K, V>,
        gate: RwLockReadGuard<'r, ()>,
    ) -> Self {
        Self {
            read_only: txn.mode().is_read_only(),
            txn: Some(txn),
            state: TransactionState::Active,
            table,
            settings,
            _gate: gate,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns `true` for read-only transactions.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Gets the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key is absent.
    pub fn get(&self, key: &K) -> RepositoryResult<V> {
        self.find(key)?.ok_or(RepositoryError::NotFound)
    }

    /// Gets the value stored under `key`, or `None` if absent.
    pub fn find(&self, key: &K) -> RepositoryResult<Option<V>> {
        let encoded = self.settings.key_codec.encode(key)?;
        match self.get_raw(&encoded)? {
            Some(bytes) => Ok(Some(self.settings.value_codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Checks if `key` is present.
    pub fn contains(&self, key: &K) -> RepositoryResult<bool> {
        let encoded = self.settings.key_codec.encode(key)?;
        Ok(self.get_raw(&encoded)?.is_some())
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if the write does not fit the mapped region;
    /// the transaction is closed and everything it wrote is discarded.
    pub fn put(&mut self, key: &K, value: &V) -> RepositoryResult<()> {
        let key = self.settings.key_codec.encode(key)?;
        let value = self.settings.value_codec.encode(value)?;
        self.put_raw(&key, &value)
    }

    /// Stores every entry, replacing previous values.
    ///
    /// Nothing becomes visible before [`Transaction::commit`]; a capacity
    /// failure partway through voids the whole transaction.
    pub fn put_many<I, KB, VB>(&mut self, entries: I) -> RepositoryResult<()>
    where
        I: IntoIterator<Item = (KB, VB)>,
        KB: Borrow<K>,
        VB: Borrow<V>,
    {
        for (key, value) in entries {
            self.put(key.borrow(), value.borrow())?;
        }
        Ok(())
    }

    /// Removes `key`. Returns `true` if it was present.
    ///
    /// Deleting an absent key is not an error.
    pub fn delete(&mut self, key: &K) -> RepositoryResult<bool> {
        let key = self.settings.key_codec.encode(key)?;
        self.delete_raw(&key)
    }

    /// Removes every key. Returns how many were present.
    pub fn delete_many<I>(&mut self, keys: I) -> RepositoryResult<usize>
    where
        I: IntoIterator,
        I::Item: Borrow<K>,
    {
        let mut removed = 0;
        for key in keys {
            if self.delete(key.borrow())? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Returns the number of entries in this transaction's snapshot.
    pub fn count(&self) -> RepositoryResult<u64> {
        let table = self.table;
        Ok(self.active()?.count(table)?)
    }

    /// Iterates all entries in ascending encoded-key order.
    ///
    /// The iterator borrows the transaction, so the transaction cannot be
    /// committed or closed while it is in use.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` if the transaction already ended.
    pub fn list(&self) -> RepositoryResult<Entries<'_, 'r, K, V, E>> {
        self.active()?;
        Ok(Entries::borrowed(self, self.settings.scan_batch_size))
    }

    /// Commits a write transaction.
    ///
    /// After commit returns, the changes are durable and visible to
    /// transactions that begin afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The transaction already ended (`TransactionClosed`)
    /// - The transaction is read-only (`ReadOnlyTransaction`); it stays active
    /// - The write set does not fit the mapped region (`CapacityExceeded`)
    pub fn commit(&mut self) -> RepositoryResult<()> {
        self.active()?;
        if self.read_only {
            return Err(RepositoryError::ReadOnlyTransaction);
        }
        let txn = self.txn.take().ok_or(RepositoryError::TransactionClosed)?;
        match txn.commit() {
            Ok(()) => {
                self.state = TransactionState::Committed;
                Ok(())
            }
            Err(err) => {
                self.state = TransactionState::Closed;
                Err(err.into())
            }
        }
    }

    /// Ends the transaction without committing.
    ///
    /// Ends a read-only transaction; aborts a write transaction.
    pub fn close(&mut self) -> RepositoryResult<()> {
        let txn = self.txn.take().ok_or(RepositoryError::TransactionClosed)?;
        txn.abort();
        self.state = TransactionState::Closed;
        Ok(())
    }

    pub(crate) fn get_raw(&self, key: &[u8]) -> RepositoryResult<Option<Vec<u8>>> {
        let table = self.table;
        Ok(self.active()?.get(table, key)?)
    }

    pub(crate) fn put_raw(&mut self, key: &[u8], value: &[u8]) -> RepositoryResult<()> {
        let table = self.table;
        let result = self.writable()?.put(table, key, value);
        self.check_write(result)
    }

    pub(crate) fn delete_raw(&mut self, key: &[u8]) -> RepositoryResult<bool> {
        let table = self.table;
        let result = self.writable()?.delete(table, key);
        self.check_write(result)
    }

    pub(crate) fn scan_raw(
        &self,
        after: Option<&[u8]>,
        limit: usize,
    ) -> RepositoryResult<Vec<KeyValue>> {
        let table = self.table;
        Ok(self.active()?.scan(table, after, limit)?)
    }

    pub(crate) fn decode_entry(&self, key: &[u8], value: &[u8]) -> RepositoryResult<(K, V)> {
        Ok((
            self.settings.key_codec.decode(key)?,
            self.settings.value_codec.decode(value)?,
        ))
    }

    fn active(&self) -> RepositoryResult<&E::Txn<'r>> {
        self.txn.as_ref().ok_or(RepositoryError::TransactionClosed)
    }

    fn writable(&mut self) -> RepositoryResult<&mut E::Txn<'r>> {
        if self.txn.is_some() && self.read_only {
            return Err(RepositoryError::ReadOnlyTransaction);
        }
        self.txn.as_mut().ok_or(RepositoryError::TransactionClosed)
    }

    /// A full map poisons the engine transaction: abort it and close.
    fn check_write<T>(&mut self, result: EngineResult<T>) -> RepositoryResult<T> {
        result.map_err(|err| {
            if err.is_map_full() {
                if let Some(txn) = self.txn.take() {
                    txn.abort();
                }
                self.state = TransactionState::Closed;
            }
            err.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositorySettings;
    use crate::repository::Repository;
    use lightstore_codec::{StringCodec, U64Codec};
    use lightstore_engine::InMemoryEngine;

    type TestRepo = Repository<String, u64, InMemoryEngine>;

    fn repo() -> TestRepo {
        repo_with_map(1 << 20)
    }

    fn repo_with_map(map_size: usize) -> TestRepo {
        let settings = RepositorySettings::new("mem", StringCodec, U64Codec)
            .initial_map_size(map_size)
            .scan_batch_size(2);
        Repository::open_in_memory(settings).unwrap()
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn put_commit_get() {
        let repo = repo();
        let mut txn = repo.begin_transaction(false).unwrap();
        txn.put(&key("a"), &1).unwrap();
        assert_eq!(txn.get(&key("a")).unwrap(), 1);
        txn.commit().unwrap();
        assert_eq!(txn.state(), TransactionState::Committed);

        let txn = repo.begin_transaction(true).unwrap();
        assert_eq!(txn.get(&key("a")).unwrap(), 1);
        assert!(txn.is_read_only());
    }

    #[test]
    fn get_missing_is_not_found() {
        let repo = repo();
        let txn = repo.begin_transaction(true).unwrap();
        assert!(txn.get(&key("nope")).unwrap_err().is_not_found());
        assert_eq!(txn.find(&key("nope")).unwrap(), None);
        assert!(!txn.contains(&key("nope")).unwrap());
    }

    #[test]
    fn put_overwrites() {
        let repo = repo();
        let mut txn = repo.begin_transaction(false).unwrap();
        txn.put(&key("a"), &1).unwrap();
        txn.put(&key("a"), &2).unwrap();
        assert_eq!(txn.count().unwrap(), 1);
        assert_eq!(txn.get(&key("a")).unwrap(), 2);
    }

    #[test]
    fn delete_is_idempotent() {
        let repo = repo();
        let mut txn = repo.begin_transaction(false).unwrap();
        txn.put(&key("a"), &1).unwrap();
        assert!(txn.delete(&key("a")).unwrap());
        assert!(!txn.delete(&key("a")).unwrap());
        assert_eq!(txn.delete_many([key("a"), key("b")]).unwrap(), 0);
        txn.commit().unwrap();
    }

    #[test]
    fn operations_after_commit_fail() {
        let repo = repo();
        let mut txn = repo.begin_transaction(false).unwrap();
        txn.put(&key("a"), &1).unwrap();
        txn.commit().unwrap();

        assert!(matches!(txn.get(&key("a")), Err(RepositoryError::TransactionClosed)));
        assert!(matches!(txn.put(&key("b"), &2), Err(RepositoryError::TransactionClosed)));
        assert!(matches!(txn.count(), Err(RepositoryError::TransactionClosed)));
        assert!(matches!(txn.list(), Err(RepositoryError::TransactionClosed)));
        assert!(matches!(txn.commit(), Err(RepositoryError::TransactionClosed)));
        assert!(matches!(txn.close(), Err(RepositoryError::TransactionClosed)));
    }

    #[test]
    fn close_aborts_writes() {
        let repo = repo();
        let mut txn = repo.begin_transaction(false).unwrap();
        txn.put(&key("a"), &1).unwrap();
        txn.close().unwrap();
        assert_eq!(txn.state(), TransactionState::Closed);
        drop(txn);

        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn drop_aborts_writes() {
        let repo = repo();
        {
            let mut txn = repo.begin_transaction(false).unwrap();
            txn.put(&key("a"), &1).unwrap();
        }
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn read_only_rejects_writes_and_commit() {
        let repo = repo();
        let mut txn = repo.begin_transaction(true).unwrap();
        assert!(matches!(txn.put(&key("a"), &1), Err(RepositoryError::ReadOnlyTransaction)));
        assert!(matches!(txn.delete(&key("a")), Err(RepositoryError::ReadOnlyTransaction)));
        assert!(matches!(txn.commit(), Err(RepositoryError::ReadOnlyTransaction)));
        assert!(txn.is_active());
        txn.close().unwrap();
    }

    #[test]
    fn capacity_failure_closes_transaction() {
        let repo = repo_with_map(64);
        let mut txn = repo.begin_transaction(false).unwrap();
        txn.put(&key("a"), &1).unwrap();
        let err = txn.put_many([(key("b"), 2), (key("c"), 3)]).unwrap_err();
        assert!(err.is_capacity());
        assert_eq!(txn.state(), TransactionState::Closed);
        assert!(matches!(txn.commit(), Err(RepositoryError::TransactionClosed)));
        drop(txn);

        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn list_is_ordered_across_batches() {
        let repo = repo();
        let mut txn = repo.begin_transaction(false).unwrap();
        for (i, name) in ["d", "b", "e", "a", "c"].iter().enumerate() {
            txn.put(&key(name), &(i as u64)).unwrap();
        }

        let keys: Vec<String> = txn
            .list()
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect();
        assert_eq!(keys, ["a", "b", "c", "d", "e"]);
        txn.commit().unwrap();
    }

    #[test]
    fn count_tracks_puts_and_deletes() {
        let repo = repo();
        let mut txn = repo.begin_transaction(false).unwrap();
        txn.put_many((0..10).map(|i| (format!("k{i}"), i))).unwrap();
        assert_eq!(txn.delete_many((0..4).map(|i| format!("k{i}"))).unwrap(), 4);
        assert_eq!(txn.count().unwrap(), 6);
    }
}

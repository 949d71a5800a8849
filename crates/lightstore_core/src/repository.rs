//! The repository type.

use crate::autogrowth::Autogrowth;
use crate::config::RepositorySettings;
use crate::error::{RepositoryError, RepositoryResult};
use crate::iter::{Entries, Values};
use crate::stats::RepositoryStats;
use crate::transaction::Transaction;
use lightstore_engine::{
    EngineError, EngineTxn, InMemoryEngine, KeyValue, LmdbEngine, StorageEngine, TxnMode,
};
use std::borrow::Borrow;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// A typed, transactional key-value repository.
///
/// Keys and values are converted to bytes by the codecs in
/// [`RepositorySettings`]; entries are ordered by encoded key bytes.
///
/// Every single-shot write (`put`, `put_many`, `delete`, `delete_many`,
/// `update`) runs in its own write transaction under autogrowth: if it does
/// not fit the mapped region, the map is grown and the write is replayed from
/// scratch. Explicit transactions from [`Repository::begin_transaction`] are
/// never retried; they report `CapacityExceeded` to the caller.
///
/// The repository is `Send + Sync`. Share it between threads with `Arc` or
/// scoped threads. Writers are serialized by the engine; readers never block.
///
/// # Example
///
/// ```rust
/// use lightstore_core::{Repository, RepositorySettings, StringCodec, U64Codec};
///
/// let settings = RepositorySettings::new("unused", StringCodec, U64Codec);
/// let repo = Repository::open_in_memory(settings).unwrap();
///
/// repo.put(&"apples".to_string(), &3).unwrap();
/// repo.put(&"pears".to_string(), &5).unwrap();
///
/// assert_eq!(repo.get(&"apples".to_string()).unwrap(), 3);
/// assert_eq!(repo.count().unwrap(), 2);
/// ```
pub struct Repository<K, V, E: StorageEngine = LmdbEngine> {
    engine: E,
    table: E::Table,
    settings: RepositorySettings<K, V>,
    autogrowth: Autogrowth,
}

impl<K, V> Repository<K, V, LmdbEngine> {
    /// Opens or creates an LMDB-backed repository at `settings.path`.
    ///
    /// # Errors
    ///
    /// Returns `EngineUnavailable` if the environment cannot be opened.
    pub fn open(settings: RepositorySettings<K, V>) -> RepositoryResult<Self> {
        let engine = LmdbEngine::open(&settings.path, &settings.engine_options()).map_err(
            |source| RepositoryError::EngineUnavailable {
                path: settings.path.clone(),
                source,
            },
        )?;
        Self::with_engine(engine, settings)
    }
}

impl<K, V> Repository<K, V, InMemoryEngine> {
    /// Opens a repository that keeps everything in memory.
    ///
    /// `settings.path` is ignored. Map size limits and autogrowth still apply.
    pub fn open_in_memory(settings: RepositorySettings<K, V>) -> RepositoryResult<Self> {
        let engine = InMemoryEngine::new(settings.engine_options());
        Self::with_engine(engine, settings)
    }
}

impl<K, V, E: StorageEngine> Repository<K, V, E> {
    /// Wraps an already opened engine.
    ///
    /// The default table is created (or opened) in a write transaction that
    /// is committed immediately.
    ///
    /// # Errors
    ///
    /// Returns `EngineUnavailable` if the default table cannot be obtained.
    pub fn with_engine(engine: E, settings: RepositorySettings<K, V>) -> RepositoryResult<Self> {
        let unavailable = |source: EngineError| RepositoryError::EngineUnavailable {
            path: settings.path.clone(),
            source,
        };

        let table = {
            let mut txn = engine.begin_txn(TxnMode::ReadWrite).map_err(unavailable)?;
            let table = txn.open_default_table().map_err(unavailable)?;
            txn.commit().map_err(unavailable)?;
            table
        };

        info!(
            path = %settings.path.display(),
            map_size = engine.map_size(),
            "opened repository"
        );

        let autogrowth = Autogrowth::new(
            settings.growth,
            settings.max_map_size,
            settings.growth_wait,
        );
        Ok(Self {
            engine,
            table,
            settings,
            autogrowth,
        })
    }

    /// Begins a transaction.
    ///
    /// Any number of read-only transactions may be live at once (up to
    /// `max_readers`); a write transaction waits for the previous writer.
    ///
    /// The map can only grow while no transaction of this process is live.
    /// Holding a transaction (of either mode) delays every write that needs
    /// growth; if it is held longer than `growth_wait`, those writes fail with
    /// `GrowthTimeout`. A thread that holds a read transaction and then writes
    /// through the repository gets `GrowthTimeout` as soon as that write needs
    /// growth.
    ///
    /// # Errors
    ///
    /// Returns `TransactionLimitExceeded` when no reader slot is free.
    pub fn begin_transaction(&self, read_only: bool) -> RepositoryResult<Transaction<'_, K, V, E>> {
        let mode = if read_only {
            TxnMode::ReadOnly
        } else {
            TxnMode::ReadWrite
        };

        let mut gate = self.autogrowth.shared();
        let txn = match self.engine.begin_txn(mode) {
            Ok(txn) => txn,
            Err(EngineError::MapResized) => {
                drop(gate);
                self.autogrowth.adopt(&self.engine)?;
                gate = self.autogrowth.shared();
                self.engine.begin_txn(mode)?
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Transaction::new(txn, self.table, &self.settings, gate))
    }

    /// Begins a read-only transaction.
    pub fn begin_read(&self) -> RepositoryResult<Transaction<'_, K, V, E>> {
        self.begin_transaction(true)
    }

    /// Begins a write transaction.
    pub fn begin_write(&self) -> RepositoryResult<Transaction<'_, K, V, E>> {
        self.begin_transaction(false)
    }

    /// Gets the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key is absent.
    pub fn get(&self, key: &K) -> RepositoryResult<V> {
        self.begin_read()?.get(key)
    }

    /// Gets the value stored under `key`, or `None` if absent.
    pub fn find(&self, key: &K) -> RepositoryResult<Option<V>> {
        self.begin_read()?.find(key)
    }

    /// Checks if `key` is present.
    pub fn contains(&self, key: &K) -> RepositoryResult<bool> {
        self.begin_read()?.contains(key)
    }

    /// Looks up many keys in one read snapshot.
    ///
    /// Values are resolved lazily, in the order of `keys`. A missing key
    /// yields `Err(NotFound)` for its item without ending the sequence.
    /// Like [`Repository::list`], the iterator holds a read transaction
    /// until it is dropped.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// for value in repo.get_many(["a", "b"].map(String::from))? {
    ///     match value {
    ///         Ok(v) => println!("{v}"),
    ///         Err(e) if e.is_not_found() => println!("missing"),
    ///         Err(e) => return Err(e),
    ///     }
    /// }
    /// ```
    pub fn get_many<I>(&self, keys: I) -> RepositoryResult<Values<'_, K, V, E, I::IntoIter>>
    where
        I: IntoIterator,
        I::Item: Borrow<K>,
    {
        Ok(Values::new(self.begin_read()?, keys.into_iter()))
    }

    /// Returns the number of entries.
    pub fn count(&self) -> RepositoryResult<u64> {
        self.begin_read()?.count()
    }

    /// Iterates all entries in ascending encoded-key order.
    ///
    /// The iterator reads one snapshot; writes committed while it is in use
    /// are not visible to it.
    ///
    /// The iterator holds a read transaction until it is exhausted or
    /// dropped, so writes that need growth meanwhile wait and may fail with
    /// `GrowthTimeout` (see [`Repository::begin_transaction`]).
    pub fn list(&self) -> RepositoryResult<Entries<'_, '_, K, V, E>> {
        let txn = self.begin_read()?;
        Ok(Entries::owned(txn, self.settings.scan_batch_size))
    }

    /// Stores `value` under `key`, growing the map if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageExhausted` if the map cannot grow enough to hold it.
    pub fn put(&self, key: &K, value: &V) -> RepositoryResult<()> {
        let entry = self.encode_entry(key, value)?;
        self.write_encoded(std::slice::from_ref(&entry), &[])
    }

    /// Stores every entry in one atomic transaction, growing the map if needed.
    ///
    /// Either all entries are stored or none are.
    pub fn put_many<I, KB, VB>(&self, entries: I) -> RepositoryResult<()>
    where
        I: IntoIterator<Item = (KB, VB)>,
        KB: Borrow<K>,
        VB: Borrow<V>,
    {
        let encoded = entries
            .into_iter()
            .map(|(key, value)| self.encode_entry(key.borrow(), value.borrow()))
            .collect::<RepositoryResult<Vec<_>>>()?;
        self.write_encoded(&encoded, &[])
    }

    /// Removes `key`. Removing an absent key succeeds.
    pub fn delete(&self, key: &K) -> RepositoryResult<()> {
        let key = self.settings.key_codec.encode(key)?;
        self.write_encoded(&[], std::slice::from_ref(&key))
    }

    /// Removes every key in one atomic transaction.
    pub fn delete_many<I>(&self, keys: I) -> RepositoryResult<()>
    where
        I: IntoIterator,
        I::Item: Borrow<K>,
    {
        let encoded = keys
            .into_iter()
            .map(|key| self.settings.key_codec.encode(key.borrow()))
            .collect::<Result<Vec<_>, _>>()?;
        self.write_encoded(&[], &encoded)
    }

    /// Runs `body` in a write transaction and commits it, growing the map and
    /// replaying `body` from the start whenever it runs out of space.
    ///
    /// `body` may run more than once, so it must not have side effects outside
    /// the transaction. Any error other than `CapacityExceeded` aborts the
    /// transaction and is returned unchanged.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// repo.update(|txn| {
    ///     let balance = txn.find(&from)?.unwrap_or(0);
    ///     txn.put(&from, &(balance - 10))?;
    ///     txn.put(&to, &10)
    /// })?;
    /// ```
    pub fn update<R, F>(&self, mut body: F) -> RepositoryResult<R>
    where
        F: FnMut(&mut Transaction<'_, K, V, E>) -> RepositoryResult<R>,
    {
        self.autogrowth.run(&self.engine, || {
            let mut txn = self.begin_write()?;
            let result = body(&mut txn)?;
            txn.commit()?;
            Ok(result)
        })
    }

    /// Returns current statistics.
    pub fn stats(&self) -> RepositoryResult<RepositoryStats> {
        Ok(RepositoryStats {
            map_size: self.map_size(),
            growth_events: self.growth_events(),
            entries: self.count()?,
        })
    }

    /// Returns the current size of the mapped region.
    #[must_use]
    pub fn map_size(&self) -> usize {
        self.engine.map_size()
    }

    /// Returns how many times autogrowth has grown the map.
    #[must_use]
    pub fn growth_events(&self) -> u64 {
        self.autogrowth.events()
    }

    /// Returns the settings the repository was opened with.
    #[must_use]
    pub fn settings(&self) -> &RepositorySettings<K, V> {
        &self.settings
    }

    /// Returns the on-disk location, or `None` for in-memory repositories.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.engine.path()
    }

    /// Returns the underlying engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Closes the repository and releases the engine.
    ///
    /// Transactions and iterators borrow the repository, so none can outlive
    /// this call. Dropping the repository closes it too, without reporting
    /// errors.
    pub fn close(self) -> RepositoryResult<()> {
        debug!(growth_events = self.growth_events(), "closing repository");
        self.engine.close()?;
        Ok(())
    }

    fn encode_entry(&self, key: &K, value: &V) -> RepositoryResult<KeyValue> {
        Ok((
            self.settings.key_codec.encode(key)?,
            self.settings.value_codec.encode(value)?,
        ))
    }

    /// Writes pre-encoded puts then deletes in one retried transaction.
    fn write_encoded(&self, puts: &[KeyValue], deletes: &[Vec<u8>]) -> RepositoryResult<()> {
        self.update(|txn| {
            for (key, value) in puts {
                txn.put_raw(key, value)?;
            }
            for key in deletes {
                txn.delete_raw(key)?;
            }
            Ok(())
        })
    }
}

impl<K, V, E: StorageEngine> fmt::Debug for Repository<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.settings.path)
            .field("map_size", &self.map_size())
            .field("growth_events", &self.growth_events())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrowthStrategy;
    use lightstore_codec::{BytesCodec, CborCodec, StringCodec, U64Codec};
    use lightstore_engine::{EngineOptions, MAX_KEY_SIZE};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn settings() -> RepositorySettings<String, u64> {
        RepositorySettings::new("mem", StringCodec, U64Codec)
    }

    fn repo() -> Repository<String, u64, InMemoryEngine> {
        Repository::open_in_memory(settings()).unwrap()
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn put_get_round_trip() {
        let repo = repo();
        repo.put(&key("a"), &1).unwrap();
        assert_eq!(repo.get(&key("a")).unwrap(), 1);
        assert_eq!(repo.find(&key("b")).unwrap(), None);
        assert!(repo.contains(&key("a")).unwrap());
        assert!(repo.get(&key("b")).unwrap_err().is_not_found());
    }

    #[test]
    fn put_many_then_delete_many_counts() {
        let repo = repo();
        repo.put_many((0..20u64).map(|i| (format!("k{i:02}"), i))).unwrap();
        repo.delete_many((0..5u64).map(|i| format!("k{i:02}"))).unwrap();
        assert_eq!(repo.count().unwrap(), 15);
    }

    #[test]
    fn delete_missing_key_succeeds() {
        let repo = repo();
        repo.delete(&key("ghost")).unwrap();
        repo.delete_many([key("x"), key("y")]).unwrap();
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn unstorable_keys_behave_alike_on_both_engines() {
        fn check<E: StorageEngine>(repo: &Repository<String, u64, E>) {
            let long = "k".repeat(MAX_KEY_SIZE + 1);
            for k in [String::new(), long] {
                assert!(repo.get(&k).unwrap_err().is_not_found());
                assert_eq!(repo.find(&k).unwrap(), None);
                assert!(!repo.contains(&k).unwrap());
                repo.delete(&k).unwrap();
                repo.delete_many([k.clone()]).unwrap();
                assert!(matches!(
                    repo.put(&k, &1).unwrap_err(),
                    RepositoryError::Engine(EngineError::InvalidKey { len }) if len == k.len()
                ));
            }
            assert_eq!(repo.count().unwrap(), 0);
        }

        check(&repo());

        let dir = tempfile::TempDir::new().unwrap();
        let lmdb_settings = RepositorySettings::new(dir.path().join("store"), StringCodec, U64Codec)
            .initial_map_size(1 << 20);
        let lmdb = Repository::open(lmdb_settings).unwrap();
        check(&lmdb);
    }

    #[test]
    fn empty_batches_are_noops() {
        let repo = repo();
        repo.put_many(Vec::<(String, u64)>::new()).unwrap();
        repo.delete_many(Vec::<String>::new()).unwrap();
        assert_eq!(repo.count().unwrap(), 0);
        assert_eq!(repo.get_many(Vec::<String>::new()).unwrap().count(), 0);
    }

    #[test]
    fn list_yields_ascending_keys() {
        let repo = repo();
        for name in ["pear", "apple", "fig", "kiwi"] {
            repo.put(&key(name), &(name.len() as u64)).unwrap();
        }
        let entries: Vec<(String, u64)> = repo.list().unwrap().map(Result::unwrap).collect();
        assert_eq!(
            entries,
            vec![
                (key("apple"), 5),
                (key("fig"), 3),
                (key("kiwi"), 4),
                (key("pear"), 4)
            ]
        );
    }

    #[test]
    fn update_commits_on_success_and_aborts_on_error() {
        let repo = repo();
        let total = repo
            .update(|txn| {
                txn.put(&key("a"), &1)?;
                txn.put(&key("b"), &2)?;
                Ok(txn.count()?)
            })
            .unwrap();
        assert_eq!(total, 2);

        let err = repo
            .update(|txn| -> RepositoryResult<()> {
                txn.put(&key("c"), &3)?;
                Err(RepositoryError::NotFound)
            })
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(repo.find(&key("c")).unwrap(), None);
    }

    #[test]
    fn small_map_grows_transparently() {
        let settings = settings().initial_map_size(256);
        let repo = Repository::open_in_memory(settings).unwrap();

        repo.put_many((0..100u64).map(|i| (format!("key-{i:04}"), i)))
            .unwrap();
        for i in 100..200u64 {
            repo.put(&format!("key-{i:04}"), &i).unwrap();
        }

        assert_eq!(repo.count().unwrap(), 200);
        assert!(repo.growth_events() >= 1);
        assert!(repo.map_size() > 256);
        assert_eq!(repo.engine().resize_count(), repo.growth_events());
    }

    #[test]
    fn growth_stops_at_max_map_size() {
        let settings = settings()
            .initial_map_size(128)
            .growth(GrowthStrategy::Fixed(128))
            .max_map_size(512);
        let repo = Repository::open_in_memory(settings).unwrap();

        let err = repo
            .put_many((0..100u64).map(|i| (format!("key-{i:04}"), i)))
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::StorageExhausted { current: 512, .. }
        ));
        assert_eq!(repo.count().unwrap(), 0);
        assert_eq!(repo.growth_events(), 3);
    }

    #[test]
    fn failed_resize_is_storage_exhausted() {
        let settings = settings().initial_map_size(128);
        let engine = InMemoryEngine::new(settings.engine_options()).with_resize_limit(256);
        let repo = Repository::with_engine(engine, settings).unwrap();

        let err = repo
            .put_many((0..100u64).map(|i| (format!("key-{i:04}"), i)))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::StorageExhausted { .. }));
        assert_eq!(repo.growth_events(), 1);
    }

    #[test]
    fn explicit_transactions_are_not_retried() {
        let settings = settings().initial_map_size(64);
        let repo = Repository::open_in_memory(settings).unwrap();

        let mut txn = repo.begin_write().unwrap();
        let err = txn
            .put_many((0..10u64).map(|i| (format!("k{i}"), i)))
            .unwrap_err();
        assert!(err.is_capacity());
        drop(txn);
        assert_eq!(repo.growth_events(), 0);
    }

    #[test]
    fn reader_limit_is_reported() {
        let settings = settings().max_readers(2);
        let repo = Repository::open_in_memory(settings).unwrap();

        let _a = repo.begin_read().unwrap();
        let _b = repo.begin_read().unwrap();
        assert!(matches!(
            repo.begin_read(),
            Err(RepositoryError::TransactionLimitExceeded)
        ));
        assert!(matches!(
            repo.get(&key("a")),
            Err(RepositoryError::TransactionLimitExceeded)
        ));
    }

    #[test]
    fn reader_snapshot_survives_concurrent_writes() {
        let repo = repo();
        repo.put(&key("a"), &1).unwrap();

        let reader = repo.begin_read().unwrap();
        repo.put(&key("a"), &2).unwrap();
        repo.put(&key("b"), &3).unwrap();

        assert_eq!(reader.get(&key("a")).unwrap(), 1);
        assert_eq!(reader.count().unwrap(), 1);
        assert_eq!(repo.get(&key("a")).unwrap(), 2);
    }

    #[test]
    fn growth_waits_for_live_readers() {
        let settings = settings()
            .initial_map_size(128)
            .growth_wait(Duration::from_millis(20));
        let repo = Repository::open_in_memory(settings).unwrap();

        let reader = repo.begin_read().unwrap();
        let err = repo
            .put_many((0..20u64).map(|i| (format!("key-{i:04}"), i)))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::GrowthTimeout { .. }));

        drop(reader);
        repo.put_many((0..20u64).map(|i| (format!("key-{i:04}"), i)))
            .unwrap();
        assert_eq!(repo.count().unwrap(), 20);
    }

    #[test]
    fn open_iterator_holds_back_growth() {
        let settings = settings()
            .initial_map_size(128)
            .scan_batch_size(1)
            .growth_wait(Duration::from_millis(20));
        let repo = Repository::open_in_memory(settings).unwrap();
        repo.put(&key("a"), &1).unwrap();

        let mut entries = repo.list().unwrap();
        assert_eq!(entries.next().unwrap().unwrap(), (key("a"), 1));
        let err = repo
            .put_many((0..20u64).map(|i| (format!("key-{i:04}"), i)))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::GrowthTimeout { .. }));
        assert!(entries.next().is_none());

        drop(entries);
        repo.put_many((0..20u64).map(|i| (format!("key-{i:04}"), i)))
            .unwrap();
        assert_eq!(repo.count().unwrap(), 21);
    }

    #[test]
    fn concurrent_writers_share_growth() {
        let settings = settings().initial_map_size(512);
        let repo = Arc::new(Repository::open_in_memory(settings).unwrap());

        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || {
                    for i in 0..50u64 {
                        repo.put(&format!("t{t}-{i:03}"), &i).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(repo.count().unwrap(), 200);
        assert!(repo.growth_events() >= 1);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        item: String,
        quantity: u32,
    }

    #[test]
    fn cbor_values() {
        let settings = RepositorySettings::new("mem", BytesCodec, CborCodec::<Order>::new());
        let repo = Repository::open_in_memory(settings).unwrap();

        let order = Order {
            item: "widget".into(),
            quantity: 4,
        };
        repo.put(&b"o-1".to_vec(), &order).unwrap();
        assert_eq!(repo.get(&b"o-1".to_vec()).unwrap(), order);
    }

    #[test]
    fn stats_report_entries_and_growth() {
        let repo = repo();
        repo.put_many((0..3u64).map(|i| (format!("k{i}"), i))).unwrap();
        let stats = repo.stats().unwrap();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.growth_events, 0);
        assert_eq!(stats.map_size, EngineOptions::default().map_size);
        assert_eq!(repo.path(), None);
    }

    #[test]
    fn close_releases_engine() {
        let repo = repo();
        repo.put(&key("a"), &1).unwrap();
        repo.close().unwrap();
    }
}

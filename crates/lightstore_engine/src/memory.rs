//! In-memory storage engine for testing.

use crate::engine::{is_storable_key, EngineTxn, KeyValue, StorageEngine, TxnMode};
use crate::error::{EngineError, EngineResult};
use crate::options::EngineOptions;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Bytes charged against the map size for every entry, on top of its key
/// and value.
pub const ENTRY_OVERHEAD: usize = 16;

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Debug, Default)]
struct Committed {
    data: Arc<Tree>,
    used: usize,
}

/// An in-memory storage engine.
///
/// This engine keeps all data in an ordered map and is suitable for:
/// - Unit tests of code generic over [`StorageEngine`]
/// - Exercising map-full and reader-limit handling without a disk
///
/// It behaves like a memory-mapped engine where it matters to callers:
/// - Every entry costs `key + value + ENTRY_OVERHEAD` bytes of the map;
///   a put that would exceed [`StorageEngine::map_size`] fails with `MapFull`
/// - Read transactions take one of `max_readers` slots
/// - One writer at a time; readers pin the snapshot committed before they began
///
/// # Example
///
/// ```rust
/// use lightstore_engine::{EngineOptions, EngineTxn, InMemoryEngine, StorageEngine, TxnMode};
///
/// let engine = InMemoryEngine::new(EngineOptions::new().map_size(64));
/// let mut txn = engine.begin_txn(TxnMode::ReadWrite).unwrap();
/// let table = txn.open_default_table().unwrap();
/// assert!(txn.put(table, b"key", &[0u8; 100]).unwrap_err().is_map_full());
/// ```
#[derive(Debug)]
pub struct InMemoryEngine {
    committed: RwLock<Committed>,
    writer: Mutex<()>,
    map_size: AtomicUsize,
    max_readers: u32,
    readers: AtomicU32,
    resize_limit: Option<usize>,
    resizes: AtomicU64,
}

/// Handle to the single table of an [`InMemoryEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InMemoryTable;

impl InMemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        Self {
            committed: RwLock::new(Committed::default()),
            writer: Mutex::new(()),
            map_size: AtomicUsize::new(options.map_size),
            max_readers: options.max_readers,
            readers: AtomicU32::new(0),
            resize_limit: None,
            resizes: AtomicU64::new(0),
        }
    }

    /// Makes every resize beyond `limit` bytes fail.
    ///
    /// Useful for testing storage exhaustion.
    #[must_use]
    pub fn with_resize_limit(mut self, limit: usize) -> Self {
        self.resize_limit = Some(limit);
        self
    }

    /// Returns how many times the map has been resized.
    #[must_use]
    pub fn resize_count(&self) -> u64 {
        self.resizes.load(Ordering::Relaxed)
    }

    /// Returns the committed bytes charged against the map.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.committed.read().used
    }

    /// Returns the number of live read transactions.
    #[must_use]
    pub fn active_readers(&self) -> u32 {
        self.readers.load(Ordering::Acquire)
    }

    fn acquire_reader_slot(&self) -> EngineResult<ReaderSlot<'_>> {
        self.readers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_readers).then_some(n + 1)
            })
            .map_err(|_| EngineError::ReadersFull)?;
        Ok(ReaderSlot(&self.readers))
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl StorageEngine for InMemoryEngine {
    type Table = InMemoryTable;
    type Txn<'e> = InMemoryTxn<'e>;

    fn begin_txn(&self, mode: TxnMode) -> EngineResult<InMemoryTxn<'_>> {
        let state = match mode {
            TxnMode::ReadOnly => {
                let slot = self.acquire_reader_slot()?;
                TxnState::Read {
                    snapshot: Arc::clone(&self.committed.read().data),
                    _slot: slot,
                }
            }
            TxnMode::ReadWrite => {
                let writer = self.writer.lock();
                let committed = self.committed.read();
                TxnState::Write {
                    base: Arc::clone(&committed.data),
                    changes: BTreeMap::new(),
                    used: committed.used,
                    count: committed.data.len() as u64,
                    _writer: writer,
                }
            }
        };
        Ok(InMemoryTxn {
            engine: self,
            state,
        })
    }

    fn map_size(&self) -> usize {
        self.map_size.load(Ordering::Acquire)
    }

    fn resize(&self, new_size: usize) -> EngineResult<usize> {
        if let Some(limit) = self.resize_limit {
            if new_size > limit {
                return Err(EngineError::resize_failed(
                    new_size,
                    format!("resize limit is {limit} bytes"),
                ));
            }
        }
        let target = new_size.max(self.used_bytes());
        self.map_size.store(target, Ordering::Release);
        self.resizes.fetch_add(1, Ordering::Relaxed);
        Ok(target)
    }

    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Releases a reader slot when dropped.
#[derive(Debug)]
struct ReaderSlot<'e>(&'e AtomicU32);

impl Drop for ReaderSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A transaction on an [`InMemoryEngine`].
#[derive(Debug)]
pub struct InMemoryTxn<'e> {
    engine: &'e InMemoryEngine,
    state: TxnState<'e>,
}

#[derive(Debug)]
enum TxnState<'e> {
    Read {
        snapshot: Arc<Tree>,
        _slot: ReaderSlot<'e>,
    },
    Write {
        base: Arc<Tree>,
        /// Pending changes; `None` marks a deletion.
        changes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
        used: usize,
        count: u64,
        _writer: MutexGuard<'e, ()>,
    },
}

fn entry_cost(key: &[u8], value: &[u8]) -> usize {
    key.len() + value.len() + ENTRY_OVERHEAD
}

impl InMemoryTxn<'_> {
    fn lookup(&self, key: &[u8]) -> Option<&[u8]> {
        match &self.state {
            TxnState::Read { snapshot, .. } => snapshot.get(key).map(Vec::as_slice),
            TxnState::Write { base, changes, .. } => match changes.get(key) {
                Some(pending) => pending.as_deref(),
                None => base.get(key).map(Vec::as_slice),
            },
        }
    }
}

impl EngineTxn for InMemoryTxn<'_> {
    type Table = InMemoryTable;

    fn mode(&self) -> TxnMode {
        match self.state {
            TxnState::Read { .. } => TxnMode::ReadOnly,
            TxnState::Write { .. } => TxnMode::ReadWrite,
        }
    }

    fn open_default_table(&mut self) -> EngineResult<InMemoryTable> {
        Ok(InMemoryTable)
    }

    fn get(&self, _table: InMemoryTable, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.lookup(key).map(<[u8]>::to_vec))
    }

    fn put(&mut self, _table: InMemoryTable, key: &[u8], value: &[u8]) -> EngineResult<()> {
        let old_cost = self.lookup(key).map(|old| entry_cost(key, old));
        let map_size = self.engine.map_size();

        let TxnState::Write {
            changes,
            used,
            count,
            ..
        } = &mut self.state
        else {
            return Err(EngineError::ReadOnlyTxn);
        };
        if !is_storable_key(key) {
            return Err(EngineError::InvalidKey { len: key.len() });
        }

        let new_used = *used - old_cost.unwrap_or(0) + entry_cost(key, value);
        if new_used > map_size {
            return Err(EngineError::MapFull);
        }

        changes.insert(key.to_vec(), Some(value.to_vec()));
        *used = new_used;
        if old_cost.is_none() {
            *count += 1;
        }
        Ok(())
    }

    fn delete(&mut self, _table: InMemoryTable, key: &[u8]) -> EngineResult<bool> {
        let old_cost = self.lookup(key).map(|old| entry_cost(key, old));

        let TxnState::Write {
            changes,
            used,
            count,
            ..
        } = &mut self.state
        else {
            return Err(EngineError::ReadOnlyTxn);
        };

        let Some(cost) = old_cost else {
            return Ok(false);
        };
        changes.insert(key.to_vec(), None);
        *used -= cost;
        *count -= 1;
        Ok(true)
    }

    fn count(&self, _table: InMemoryTable) -> EngineResult<u64> {
        Ok(match &self.state {
            TxnState::Read { snapshot, .. } => snapshot.len() as u64,
            TxnState::Write { count, .. } => *count,
        })
    }

    fn scan(
        &self,
        _table: InMemoryTable,
        after: Option<&[u8]>,
        limit: usize,
    ) -> EngineResult<Vec<KeyValue>> {
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        let range: (Bound<&[u8]>, Bound<&[u8]>) = (lower, Bound::Unbounded);

        match &self.state {
            TxnState::Read { snapshot, .. } => Ok(snapshot
                .range::<[u8], _>(range)
                .take(limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            TxnState::Write { base, changes, .. } => {
                let mut committed = base.range::<[u8], _>(range).peekable();
                let mut pending = changes.range::<[u8], _>(range).peekable();
                let mut batch = Vec::new();

                while batch.len() < limit {
                    let take_pending = match (committed.peek(), pending.peek()) {
                        (None, None) => break,
                        (Some(_), None) => false,
                        (None, Some(_)) => true,
                        (Some((ck, _)), Some((pk, _))) => pk <= ck,
                    };

                    if take_pending {
                        let Some((key, value)) = pending.next() else {
                            break;
                        };
                        // A pending change shadows the committed entry.
                        if committed.peek().is_some_and(|(ck, _)| *ck == key) {
                            committed.next();
                        }
                        if let Some(value) = value {
                            batch.push((key.clone(), value.clone()));
                        }
                    } else if let Some((key, value)) = committed.next() {
                        batch.push((key.clone(), value.clone()));
                    }
                }
                Ok(batch)
            }
        }
    }

    fn commit(self) -> EngineResult<()> {
        let TxnState::Write {
            base,
            changes,
            used,
            ..
        } = self.state
        else {
            return Ok(());
        };

        // Release our reference so `make_mut` can update in place when no
        // reader holds the old snapshot.
        drop(base);

        let mut committed = self.engine.committed.write();
        let data = Arc::make_mut(&mut committed.data);
        for (key, change) in changes {
            match change {
                Some(value) => {
                    data.insert(key, value);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        committed.used = used;
        Ok(())
    }

    fn abort(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> InMemoryEngine {
        InMemoryEngine::new(EngineOptions::new().map_size(1 << 20).max_readers(4))
    }

    fn put_committed(engine: &InMemoryEngine, pairs: &[(&str, &str)]) {
        let mut txn = engine.begin_txn(TxnMode::ReadWrite).unwrap();
        for (k, v) in pairs {
            txn.put(InMemoryTable, k.as_bytes(), v.as_bytes()).unwrap();
        }
        txn.commit().unwrap();
    }

    #[test]
    fn memory_put_get_commit() {
        let engine = engine();
        put_committed(&engine, &[("a", "1")]);

        let txn = engine.begin_txn(TxnMode::ReadOnly).unwrap();
        assert_eq!(txn.get(InMemoryTable, b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(txn.count(InMemoryTable).unwrap(), 1);
        assert_eq!(engine.used_bytes(), 2 + ENTRY_OVERHEAD);
    }

    #[test]
    fn memory_abort_discards() {
        let engine = engine();
        let mut txn = engine.begin_txn(TxnMode::ReadWrite).unwrap();
        txn.put(InMemoryTable, b"a", b"1").unwrap();
        txn.abort();

        let txn = engine.begin_txn(TxnMode::ReadOnly).unwrap();
        assert_eq!(txn.get(InMemoryTable, b"a").unwrap(), None);
        assert_eq!(engine.used_bytes(), 0);
    }

    #[test]
    fn memory_reader_keeps_snapshot() {
        let engine = engine();
        put_committed(&engine, &[("a", "1")]);

        let reader = engine.begin_txn(TxnMode::ReadOnly).unwrap();
        put_committed(&engine, &[("a", "2"), ("b", "3")]);

        assert_eq!(reader.get(InMemoryTable, b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(reader.get(InMemoryTable, b"b").unwrap(), None);
        assert_eq!(reader.count(InMemoryTable).unwrap(), 1);

        let fresh = engine.begin_txn(TxnMode::ReadOnly).unwrap();
        assert_eq!(fresh.get(InMemoryTable, b"a").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn memory_write_txn_sees_own_changes() {
        let engine = engine();
        put_committed(&engine, &[("a", "1"), ("c", "3"), ("e", "5")]);

        let mut txn = engine.begin_txn(TxnMode::ReadWrite).unwrap();
        txn.put(InMemoryTable, b"b", b"2").unwrap();
        txn.put(InMemoryTable, b"c", b"33").unwrap();
        assert!(txn.delete(InMemoryTable, b"e").unwrap());
        assert!(!txn.delete(InMemoryTable, b"zz").unwrap());

        assert_eq!(txn.count(InMemoryTable).unwrap(), 3);
        let all = txn.scan(InMemoryTable, None, 10).unwrap();
        assert_eq!(
            all,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
                (b"c".to_vec(), b"33".to_vec()),
            ]
        );

        let tail = txn.scan(InMemoryTable, Some(b"a".as_slice()), 1).unwrap();
        assert_eq!(tail, vec![(b"b".to_vec(), b"2".to_vec())]);
    }

    #[test]
    fn memory_map_full_and_resize() {
        let engine = InMemoryEngine::new(EngineOptions::new().map_size(64));
        let mut txn = engine.begin_txn(TxnMode::ReadWrite).unwrap();
        txn.put(InMemoryTable, b"k1", &[0; 20]).unwrap();
        let err = txn.put(InMemoryTable, b"k2", &[0; 40]).unwrap_err();
        assert!(err.is_map_full());
        drop(txn);

        assert_eq!(engine.resize(1024).unwrap(), 1024);
        assert_eq!(engine.resize_count(), 1);

        let mut txn = engine.begin_txn(TxnMode::ReadWrite).unwrap();
        txn.put(InMemoryTable, b"k1", &[0; 20]).unwrap();
        txn.put(InMemoryTable, b"k2", &[0; 40]).unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn memory_resize_limit() {
        let engine = InMemoryEngine::new(EngineOptions::new().map_size(64)).with_resize_limit(128);
        assert!(engine.resize(128).is_ok());
        let err = engine.resize(256).unwrap_err();
        assert!(matches!(err, EngineError::ResizeFailed { requested: 256, .. }));
    }

    #[test]
    fn memory_readers_full_and_release() {
        let engine = engine();
        let readers: Vec<_> = (0..4)
            .map(|_| engine.begin_txn(TxnMode::ReadOnly).unwrap())
            .collect();
        assert_eq!(engine.active_readers(), 4);

        let err = engine.begin_txn(TxnMode::ReadOnly).unwrap_err();
        assert!(matches!(err, EngineError::ReadersFull));

        drop(readers);
        assert_eq!(engine.active_readers(), 0);
        assert!(engine.begin_txn(TxnMode::ReadOnly).is_ok());
    }

    #[test]
    fn memory_write_on_read_txn_fails() {
        let engine = engine();
        let mut txn = engine.begin_txn(TxnMode::ReadOnly).unwrap();
        assert!(matches!(
            txn.put(InMemoryTable, b"a", b"1"),
            Err(EngineError::ReadOnlyTxn)
        ));
        assert!(matches!(
            txn.delete(InMemoryTable, b"a"),
            Err(EngineError::ReadOnlyTxn)
        ));
    }

    #[test]
    fn memory_rejects_unstorable_keys() {
        let engine = engine();
        let mut txn = engine.begin_txn(TxnMode::ReadWrite).unwrap();
        assert!(matches!(
            txn.put(InMemoryTable, b"", b"1"),
            Err(EngineError::InvalidKey { len: 0 })
        ));
        assert!(matches!(
            txn.put(InMemoryTable, &[0u8; 512], b"1"),
            Err(EngineError::InvalidKey { len: 512 })
        ));
        assert_eq!(txn.get(InMemoryTable, b"").unwrap(), None);
        assert!(!txn.delete(InMemoryTable, b"").unwrap());
        txn.commit().unwrap();
        assert_eq!(engine.used_bytes(), 0);
    }

    #[test]
    fn memory_overwrite_recharges_map() {
        let engine = engine();
        put_committed(&engine, &[("a", "0123456789")]);
        put_committed(&engine, &[("a", "0123")]);
        assert_eq!(engine.used_bytes(), 1 + 4 + ENTRY_OVERHEAD);
    }
}

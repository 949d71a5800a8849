//! LMDB storage engine.
//!
//! Opening an environment, changing its flags and resizing its map are
//! `unsafe` in `heed` because LMDB cannot check the conditions itself. Those
//! calls live here and nowhere else.

#![allow(unsafe_code)]

use crate::engine::{is_storable_key, EngineTxn, KeyValue, StorageEngine, TxnMode};
use crate::error::{EngineError, EngineResult};
use crate::options::EngineOptions;
use heed::types::Bytes;
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn, RwTxn};
use std::fs;
use std::io;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Map sizes are rounded up to a multiple of this many bytes.
///
/// LMDB wants a multiple of the OS page size; 64 KiB covers every page size
/// in use today.
pub const MAP_SIZE_ALIGNMENT: usize = 64 * 1024;

const DATA_FILE: &str = "data.mdb";

/// The default (unnamed) LMDB database, keyed and valued by raw bytes.
pub type LmdbTable = Database<Bytes, Bytes>;

/// A storage engine backed by an LMDB environment.
///
/// The environment lives in a directory holding `data.mdb` and `lock.mdb`.
/// Data survives process restarts.
///
/// # Map size
///
/// LMDB fails writes with `MDB_MAP_FULL` once the memory map is exhausted.
/// The engine only reports that condition; growing the map is left to the
/// caller through [`StorageEngine::resize`].
///
/// # Example
///
/// ```no_run
/// use lightstore_engine::{EngineOptions, LmdbEngine, StorageEngine};
/// use std::path::Path;
///
/// let engine = LmdbEngine::open(Path::new("store"), &EngineOptions::default()).unwrap();
/// assert!(engine.map_size() >= 10 * 1024 * 1024);
/// ```
pub struct LmdbEngine {
    env: Env,
    path: PathBuf,
    map_size: AtomicUsize,
}

impl LmdbEngine {
    /// Opens or creates an environment in the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory is missing and `create_if_missing` is false
    /// - The environment is corrupted or was written by an incompatible version
    /// - An I/O error occurs
    pub fn open(path: &Path, options: &EngineOptions) -> EngineResult<Self> {
        if !path.exists() {
            if !options.create_if_missing {
                return Err(EngineError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no environment at {}", path.display()),
                )));
            }
            fs::create_dir_all(path)?;
        }

        let map_size = align_map_size(options.map_size.max(data_file_len(path)))?;

        let mut builder = EnvOpenOptions::new();
        builder.map_size(map_size).max_readers(options.max_readers);
        if !options.sync_on_commit {
            // SAFETY: NO_SYNC only drops the fsync after commit. A system crash
            // may lose the latest commits but never corrupts the environment.
            unsafe {
                builder.flags(EnvFlags::NO_SYNC);
            }
        }

        // SAFETY: the environment is owned by this engine and never opened
        // twice through it; LMDB's remaining requirement (no concurrent
        // truncation of the data file) is outside the process' control.
        let env = unsafe { builder.open(path)? };

        debug!(path = %path.display(), map_size, "opened lmdb environment");

        Ok(Self {
            env,
            path: path.to_path_buf(),
            map_size: AtomicUsize::new(map_size),
        })
    }

    /// Returns the size of the data file on disk.
    #[must_use]
    pub fn disk_size(&self) -> u64 {
        data_file_len(&self.path) as u64
    }
}

impl StorageEngine for LmdbEngine {
    type Table = LmdbTable;
    type Txn<'e> = LmdbTxn<'e>;

    fn begin_txn(&self, mode: TxnMode) -> EngineResult<LmdbTxn<'_>> {
        let inner = match mode {
            TxnMode::ReadOnly => TxnInner::Read(self.env.read_txn()?),
            TxnMode::ReadWrite => TxnInner::Write(self.env.write_txn()?),
        };
        Ok(LmdbTxn {
            env: &self.env,
            inner,
        })
    }

    fn map_size(&self) -> usize {
        self.map_size.load(Ordering::Acquire)
    }

    fn resize(&self, new_size: usize) -> EngineResult<usize> {
        // Another process may have grown the file past what we asked for.
        let target = align_map_size(new_size.max(data_file_len(&self.path)))?;

        // SAFETY: callers guarantee no transaction of this process is live
        // while the map is resized (see `StorageEngine::resize`).
        unsafe { self.env.resize(target) }
            .map_err(|e| EngineError::resize_failed(target, e.to_string()))?;

        self.map_size.store(target, Ordering::Release);
        debug!(path = %self.path.display(), map_size = target, "resized lmdb map");
        Ok(target)
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn close(self) -> EngineResult<()> {
        self.env.prepare_for_closing().wait();
        Ok(())
    }
}

/// A transaction on an [`LmdbEngine`].
pub struct LmdbTxn<'e> {
    env: &'e Env,
    inner: TxnInner<'e>,
}

enum TxnInner<'e> {
    Read(RoTxn<'e>),
    Write(RwTxn<'e>),
}

impl<'e> LmdbTxn<'e> {
    fn ro(&self) -> &RoTxn<'e> {
        match &self.inner {
            TxnInner::Read(txn) => txn,
            TxnInner::Write(txn) => &**txn,
        }
    }

    fn rw(&mut self) -> EngineResult<&mut RwTxn<'e>> {
        match &mut self.inner {
            TxnInner::Write(txn) => Ok(txn),
            TxnInner::Read(_) => Err(EngineError::ReadOnlyTxn),
        }
    }
}

impl EngineTxn for LmdbTxn<'_> {
    type Table = LmdbTable;

    fn mode(&self) -> TxnMode {
        match self.inner {
            TxnInner::Read(_) => TxnMode::ReadOnly,
            TxnInner::Write(_) => TxnMode::ReadWrite,
        }
    }

    fn open_default_table(&mut self) -> EngineResult<LmdbTable> {
        let env = self.env;
        match &mut self.inner {
            TxnInner::Write(txn) => Ok(env.create_database(txn, None)?),
            TxnInner::Read(txn) => env.open_database(txn, None)?.ok_or(EngineError::TableMissing),
        }
    }

    fn get(&self, table: LmdbTable, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        // LMDB answers MDB_BAD_VALSIZE for these instead of "not found".
        if !is_storable_key(key) {
            return Ok(None);
        }
        Ok(table.get(self.ro(), key)?.map(<[u8]>::to_vec))
    }

    fn put(&mut self, table: LmdbTable, key: &[u8], value: &[u8]) -> EngineResult<()> {
        let txn = self.rw()?;
        if !is_storable_key(key) {
            return Err(EngineError::InvalidKey { len: key.len() });
        }
        table.put(txn, key, value)?;
        Ok(())
    }

    fn delete(&mut self, table: LmdbTable, key: &[u8]) -> EngineResult<bool> {
        let txn = self.rw()?;
        if !is_storable_key(key) {
            return Ok(false);
        }
        Ok(table.delete(txn, key)?)
    }

    fn count(&self, table: LmdbTable) -> EngineResult<u64> {
        Ok(table.len(self.ro())?)
    }

    fn scan(
        &self,
        table: LmdbTable,
        after: Option<&[u8]>,
        limit: usize,
    ) -> EngineResult<Vec<KeyValue>> {
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        let range: (Bound<&[u8]>, Bound<&[u8]>) = (lower, Bound::Unbounded);

        let mut batch = Vec::with_capacity(limit.min(1024));
        for item in table.range(self.ro(), &range)?.take(limit) {
            let (key, value) = item?;
            batch.push((key.to_vec(), value.to_vec()));
        }
        Ok(batch)
    }

    fn commit(self) -> EngineResult<()> {
        match self.inner {
            TxnInner::Write(txn) => Ok(txn.commit()?),
            TxnInner::Read(txn) => {
                drop(txn);
                Ok(())
            }
        }
    }

    fn abort(self) {
        match self.inner {
            TxnInner::Write(txn) => txn.abort(),
            TxnInner::Read(txn) => drop(txn),
        }
    }
}

fn align_map_size(size: usize) -> EngineResult<usize> {
    size.max(MAP_SIZE_ALIGNMENT)
        .checked_next_multiple_of(MAP_SIZE_ALIGNMENT)
        .ok_or_else(|| EngineError::resize_failed(size, "map size overflows usize"))
}

fn data_file_len(dir: &Path) -> usize {
    fs::metadata(dir.join(DATA_FILE))
        .map(|meta| usize::try_from(meta.len()).unwrap_or(usize::MAX))
        .unwrap_or(0)
}

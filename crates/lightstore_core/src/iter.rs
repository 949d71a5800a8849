//! Lazy sequences over a transaction snapshot.

use crate::error::RepositoryResult;
use crate::transaction::Transaction;
use lightstore_engine::{KeyValue, StorageEngine};
use std::borrow::Borrow;
use std::collections::VecDeque;
use std::fmt;

/// Where an iterator's transaction lives.
enum Source<'t, 'r, K, V, E: StorageEngine> {
    /// Opened for this iterator; released when it finishes or is dropped.
    Owned(Transaction<'r, K, V, E>),
    /// Supplied by the caller, who keeps ownership.
    Borrowed(&'t Transaction<'r, K, V, E>),
}

impl<'r, K, V, E: StorageEngine> Source<'_, 'r, K, V, E> {
    fn txn(&self) -> &Transaction<'r, K, V, E> {
        match self {
            Self::Owned(txn) => txn,
            Self::Borrowed(txn) => txn,
        }
    }
}

/// Iterator over every entry of a snapshot, in ascending encoded-key order.
///
/// Entries are pulled from the engine `scan_batch_size` at a time and decoded
/// as they are yielded. A failed decode yields an error for that entry and the
/// iterator moves on; a failed scan yields one error and ends the iterator.
///
/// When created by [`crate::Repository::list`] the iterator owns a read
/// transaction, which is released once the iterator is exhausted or dropped.
pub struct Entries<'t, 'r, K, V, E: StorageEngine> {
    source: Source<'t, 'r, K, V, E>,
    buffer: VecDeque<KeyValue>,
    after: Option<Vec<u8>>,
    batch_size: usize,
    exhausted: bool,
}

impl<'t, 'r, K, V, E: StorageEngine> Entries<'t, 'r, K, V, E> {
    pub(crate) fn owned(txn: Transaction<'r, K, V, E>, batch_size: usize) -> Self {
        Self::with_source(Source::Owned(txn), batch_size)
    }

    pub(crate) fn borrowed(txn: &'t Transaction<'r, K, V, E>, batch_size: usize) -> Self {
        Self::with_source(Source::Borrowed(txn), batch_size)
    }

    fn with_source(source: Source<'t, 'r, K, V, E>, batch_size: usize) -> Self {
        Self {
            source,
            buffer: VecDeque::new(),
            after: None,
            batch_size: batch_size.max(1),
            exhausted: false,
        }
    }

    /// Stops iterating and releases an owned transaction.
    ///
    /// Dropping the iterator does the same; this form surfaces the result.
    pub fn close(self) -> RepositoryResult<()> {
        match self.source {
            Source::Owned(mut txn) if txn.is_active() => txn.close(),
            _ => Ok(()),
        }
    }

    fn fill(&mut self) -> RepositoryResult<()> {
        let batch = self
            .source
            .txn()
            .scan_raw(self.after.as_deref(), self.batch_size)?;
        if batch.len() < self.batch_size {
            self.exhausted = true;
        }
        if let Some((last, _)) = batch.last() {
            self.after = Some(last.clone());
        }
        self.buffer.extend(batch);
        Ok(())
    }

    fn release(&mut self) {
        if let Source::Owned(txn) = &mut self.source {
            if txn.is_active() {
                // Closing an active transaction cannot fail.
                let _ = txn.close();
            }
        }
    }
}

impl<K, V, E: StorageEngine> Iterator for Entries<'_, '_, K, V, E> {
    type Item = RepositoryResult<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                self.buffer.clear();
                self.release();
                return Some(Err(err));
            }
        }

        match self.buffer.pop_front() {
            Some((key, value)) => Some(self.source.txn().decode_entry(&key, &value)),
            None => {
                self.release();
                None
            }
        }
    }
}

impl<K, V, E: StorageEngine> fmt::Debug for Entries<'_, '_, K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entries")
            .field("buffered", &self.buffer.len())
            .field("batch_size", &self.batch_size)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

/// Iterator yielding the value of each requested key, in request order.
///
/// Every item is resolved against the same read snapshot when it is pulled.
/// A missing key yields `Err(NotFound)` for that item only; later keys are
/// still resolved.
pub struct Values<'r, K, V, E: StorageEngine, I> {
    txn: Transaction<'r, K, V, E>,
    keys: I,
}

impl<'r, K, V, E: StorageEngine, I> Values<'r, K, V, E, I> {
    pub(crate) fn new(txn: Transaction<'r, K, V, E>, keys: I) -> Self {
        Self { txn, keys }
    }

    /// Stops iterating and releases the read transaction.
    pub fn close(mut self) -> RepositoryResult<()> {
        if self.txn.is_active() {
            self.txn.close()
        } else {
            Ok(())
        }
    }
}

impl<K, V, E, I> Iterator for Values<'_, K, V, E, I>
where
    E: StorageEngine,
    I: Iterator,
    I::Item: Borrow<K>,
{
    type Item = RepositoryResult<V>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.keys.next() {
            Some(key) => Some(self.txn.get(key.borrow())),
            None => {
                if self.txn.is_active() {
                    let _ = self.txn.close();
                }
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl<K, V, E: StorageEngine, I> fmt::Debug for Values<'_, K, V, E, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Values")
            .field("active", &self.txn.is_active())
            .finish_non_exhaustive()
    }
}

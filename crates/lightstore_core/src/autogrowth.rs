//! Map autogrowth.
//!
//! A write that does not fit the mapped region fails with
//! [`RepositoryError::CapacityExceeded`]. [`Autogrowth::run`] catches that,
//! grows the map one step and replays the whole unit of work, until it either
//! succeeds, fails with any other error, or the map cannot grow further.
//!
//! Growing requires that no transaction of this process is live, so every
//! transaction holds a shared guard on the resize gate and a growth step takes
//! it exclusively.

use crate::config::GrowthStrategy;
use crate::error::{RepositoryError, RepositoryResult};
use lightstore_engine::StorageEngine;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Grows the mapped region on demand and replays writes that ran out of space.
#[derive(Debug)]
pub(crate) struct Autogrowth {
    strategy: GrowthStrategy,
    max_map_size: Option<usize>,
    wait: Duration,
    gate: RwLock<()>,
    events: AtomicU64,
}

impl Autogrowth {
    pub(crate) fn new(strategy: GrowthStrategy, max_map_size: Option<usize>, wait: Duration) -> Self {
        Self {
            strategy,
            max_map_size,
            wait,
            gate: RwLock::new(()),
            events: AtomicU64::new(0),
        }
    }

    /// Number of successful growth steps so far.
    pub(crate) fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Guard every transaction holds for its whole lifetime.
    ///
    /// Recursive so a thread already holding a transaction can open another
    /// one while a growth step is queued.
    pub(crate) fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read_recursive()
    }

    fn exclusive(&self) -> RepositoryResult<RwLockWriteGuard<'_, ()>> {
        self.gate
            .try_write_for(self.wait)
            .ok_or(RepositoryError::GrowthTimeout { waited: self.wait })
    }

    /// Runs `attempt` until it stops failing with `CapacityExceeded`.
    ///
    /// `attempt` must begin and finish its own transaction: the map can only
    /// grow between attempts.
    pub(crate) fn run<E, R, F>(&self, engine: &E, mut attempt: F) -> RepositoryResult<R>
    where
        E: StorageEngine,
        F: FnMut() -> RepositoryResult<R>,
    {
        let mut retries = 0u32;
        loop {
            let observed = engine.map_size();
            match attempt() {
                Err(err) if err.is_capacity() => {
                    retries += 1;
                    debug!(retries, map_size = observed, "write did not fit, growing map");
                    self.grow(engine, observed)?;
                }
                result => return result,
            }
        }
    }

    /// Grows the map past `observed`, the size the failed attempt ran against.
    ///
    /// If another writer already grew the map in the meantime, nothing is done
    /// and the caller simply retries.
    pub(crate) fn grow<E: StorageEngine>(&self, engine: &E, observed: usize) -> RepositoryResult<usize> {
        let _exclusive = self.exclusive()?;

        let current = engine.map_size();
        if current > observed {
            debug!(current, observed, "map already grown by another writer");
            return Ok(current);
        }

        let next = self.strategy.next_size(current);
        let target = match self.max_map_size {
            Some(max) if current >= max => None,
            Some(max) => Some(next.map_or(max, |next| next.min(max))),
            None => next,
        };
        let Some(target) = target else {
            warn!(current, max = ?self.max_map_size, "map cannot grow any further");
            return Err(RepositoryError::storage_exhausted(current, next, None));
        };

        let applied = engine.resize(target).map_err(|err| {
            warn!(current, target, error = %err, "map resize failed");
            RepositoryError::storage_exhausted(current, Some(target), Some(err))
        })?;

        self.events.fetch_add(1, Ordering::Relaxed);
        info!(from = current, to = applied, "grew map");
        Ok(applied)
    }

    /// Adopts a map size another process set, under the exclusive gate.
    pub(crate) fn adopt<E: StorageEngine>(&self, engine: &E) -> RepositoryResult<usize> {
        let _exclusive = self.exclusive()?;
        let current = engine.map_size();
        let applied = engine
            .resize(current)
            .map_err(|err| RepositoryError::storage_exhausted(current, Some(current), Some(err)))?;
        debug!(map_size = applied, "adopted map size set by another process");
        Ok(applied)
    }
}

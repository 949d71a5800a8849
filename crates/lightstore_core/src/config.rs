//! Repository configuration.

use lightstore_codec::Codec;
use lightstore_engine::EngineOptions;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How the mapped region grows when a write runs out of space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthStrategy {
    /// Double the map on every growth step.
    Doubling,
    /// Add a fixed number of bytes on every growth step.
    Fixed(usize),
}

impl Default for GrowthStrategy {
    fn default() -> Self {
        Self::Doubling
    }
}

impl GrowthStrategy {
    /// Returns the map size that follows `current`, or `None` on overflow.
    ///
    /// A zero-sized fixed step is treated as one byte so growth always
    /// makes progress.
    #[must_use]
    pub fn next_size(self, current: usize) -> Option<usize> {
        match self {
            Self::Doubling => current.max(1).checked_mul(2),
            Self::Fixed(step) => current.checked_add(step.max(1)),
        }
    }
}

/// Configuration for opening a repository.
///
/// The codecs are required; everything else has a default.
///
/// # Example
///
/// ```rust
/// use lightstore_core::{CborCodec, GrowthStrategy, RepositorySettings, StringCodec};
///
/// let settings = RepositorySettings::<String, Vec<u32>>::new(
///     "data/orders",
///     StringCodec,
///     CborCodec::new(),
/// )
/// .initial_map_size(1 << 20)
/// .growth(GrowthStrategy::Fixed(16 << 20))
/// .sync_on_commit(false);
///
/// assert_eq!(settings.initial_map_size, 1 << 20);
/// ```
pub struct RepositorySettings<K, V> {
    /// Directory holding the storage files.
    pub path: PathBuf,

    /// Converts keys to and from bytes. Its byte order is the entry order.
    pub key_codec: Arc<dyn Codec<K>>,

    /// Converts values to and from bytes.
    pub value_codec: Arc<dyn Codec<V>>,

    /// Map size used when the store is opened.
    pub initial_map_size: usize,

    /// How the map grows when a write does not fit.
    pub growth: GrowthStrategy,

    /// Upper bound for autogrowth (None = limited only by the engine).
    pub max_map_size: Option<usize>,

    /// Maximum number of concurrent read transactions.
    pub max_readers: u32,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether every commit is synced to disk (safer but slower).
    pub sync_on_commit: bool,

    /// Entries fetched from the engine per step of a full scan.
    pub scan_batch_size: usize,

    /// How long a growth step waits for in-flight transactions to finish.
    pub growth_wait: Duration,
}

impl<K, V> RepositorySettings<K, V> {
    /// Creates settings with default tuning.
    pub fn new(
        path: impl Into<PathBuf>,
        key_codec: impl Codec<K> + 'static,
        value_codec: impl Codec<V> + 'static,
    ) -> Self {
        let engine = EngineOptions::default();
        Self {
            path: path.into(),
            key_codec: Arc::new(key_codec),
            value_codec: Arc::new(value_codec),
            initial_map_size: engine.map_size,
            growth: GrowthStrategy::default(),
            max_map_size: None,
            max_readers: engine.max_readers,
            create_if_missing: engine.create_if_missing,
            sync_on_commit: engine.sync_on_commit,
            scan_batch_size: 256,
            growth_wait: Duration::from_secs(30),
        }
    }

    /// Sets the initial map size.
    #[must_use]
    pub fn initial_map_size(mut self, size: usize) -> Self {
        self.initial_map_size = size;
        self
    }

    /// Sets the growth strategy.
    #[must_use]
    pub fn growth(mut self, growth: GrowthStrategy) -> Self {
        self.growth = growth;
        self
    }

    /// Caps the map size autogrowth may reach.
    #[must_use]
    pub fn max_map_size(mut self, size: usize) -> Self {
        self.max_map_size = Some(size);
        self
    }

    /// Sets the reader slot limit.
    #[must_use]
    pub fn max_readers(mut self, readers: u32) -> Self {
        self.max_readers = readers;
        self
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether commits are synced to disk.
    #[must_use]
    pub fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the scan batch size (at least 1).
    #[must_use]
    pub fn scan_batch_size(mut self, size: usize) -> Self {
        self.scan_batch_size = size.max(1);
        self
    }

    /// Sets how long a growth step waits for in-flight transactions.
    #[must_use]
    pub fn growth_wait(mut self, wait: Duration) -> Self {
        self.growth_wait = wait;
        self
    }

    /// Returns the storage path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Derives the options the storage engine is opened with.
    #[must_use]
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::new()
            .map_size(self.initial_map_size)
            .max_readers(self.max_readers)
            .create_if_missing(self.create_if_missing)
            .sync_on_commit(self.sync_on_commit)
    }
}

impl<K, V> Clone for RepositorySettings<K, V> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            key_codec: Arc::clone(&self.key_codec),
            value_codec: Arc::clone(&self.value_codec),
            initial_map_size: self.initial_map_size,
            growth: self.growth,
            max_map_size: self.max_map_size,
            max_readers: self.max_readers,
            create_if_missing: self.create_if_missing,
            sync_on_commit: self.sync_on_commit,
            scan_batch_size: self.scan_batch_size,
            growth_wait: self.growth_wait,
        }
    }
}

impl<K, V> fmt::Debug for RepositorySettings<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositorySettings")
            .field("path", &self.path)
            .field("initial_map_size", &self.initial_map_size)
            .field("growth", &self.growth)
            .field("max_map_size", &self.max_map_size)
            .field("max_readers", &self.max_readers)
            .field("create_if_missing", &self.create_if_missing)
            .field("sync_on_commit", &self.sync_on_commit)
            .field("scan_batch_size", &self.scan_batch_size)
            .field("growth_wait", &self.growth_wait)
            .finish_non_exhaustive()
    }
}

//! Engine open options.

/// Options for opening a storage engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Initial size of the mapped region in bytes.
    pub map_size: usize,

    /// Maximum number of concurrent read transactions.
    pub max_readers: u32,

    /// Whether to create the environment directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether every commit is flushed to disk before returning.
    pub sync_on_commit: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            map_size: 10 * 1024 * 1024, // 10 MB
            max_readers: 126,
            create_if_missing: true,
            sync_on_commit: true,
        }
    }
}

impl EngineOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial map size.
    #[must_use]
    pub const fn map_size(mut self, size: usize) -> Self {
        self.map_size = size;
        self
    }

    /// Sets the reader slot limit.
    #[must_use]
    pub const fn max_readers(mut self, readers: u32) -> Self {
        self.max_readers = readers;
        self
    }

    /// Sets whether to create the environment if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether commits are synced to disk.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

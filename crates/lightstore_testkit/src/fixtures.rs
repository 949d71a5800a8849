//! Test fixtures and repository helpers.
//!
//! Provides convenience functions for setting up test repositories
//! and common test scenarios.

use lightstore_codec::{BytesCodec, StringCodec};
use lightstore_core::{
    InMemoryEngine, LmdbEngine, Repository, RepositorySettings, StorageEngine,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Repository type used throughout the testkit: string keys, raw byte values.
pub type TestRepo<E = LmdbEngine> = Repository<String, Vec<u8>, E>;

/// Settings type matching [`TestRepo`].
pub type TestSettings = RepositorySettings<String, Vec<u8>>;

/// Returns settings for a test repository at `path`.
///
/// Commits are not synced; tests care about visibility, not crash safety.
pub fn test_settings(path: impl Into<PathBuf>) -> TestSettings {
    RepositorySettings::new(path, StringCodec, BytesCodec).sync_on_commit(false)
}

/// Returns the key used for the `i`-th generated entry.
///
/// Keys are zero-padded so their byte order matches `i`.
pub fn key_for(i: u64) -> String {
    format!("key-{i:08}")
}

/// Returns a deterministic value of `size` bytes for the `i`-th entry.
pub fn value_for(i: u64, size: usize) -> Vec<u8> {
    let seed = i.to_be_bytes();
    (0..size).map(|n| seed[n % seed.len()] ^ n as u8).collect()
}

/// A test repository with automatic cleanup.
pub struct TestRepository<E: StorageEngine = LmdbEngine> {
    /// The repository instance.
    pub repo: TestRepo<E>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestRepository<InMemoryEngine> {
    /// Creates a new in-memory test repository.
    pub fn memory() -> Self {
        Self::memory_with(|settings| settings)
    }

    /// Creates an in-memory test repository with adjusted settings.
    pub fn memory_with(configure: impl FnOnce(TestSettings) -> TestSettings) -> Self {
        let settings = configure(test_settings("memory"));
        Self {
            repo: Repository::open_in_memory(settings)
                .expect("Failed to open in-memory repository"),
            _temp_dir: None,
        }
    }
}

impl TestRepository<LmdbEngine> {
    /// Creates a new LMDB-backed test repository in a temporary directory.
    pub fn lmdb() -> Self {
        Self::lmdb_with(|settings| settings)
    }

    /// Creates an LMDB-backed test repository with adjusted settings.
    pub fn lmdb_with(configure: impl FnOnce(TestSettings) -> TestSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let settings = configure(test_settings(temp_dir.path().join("store")));
        Self {
            repo: Repository::open(settings).expect("Failed to open LMDB repository"),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Closes the repository and opens it again from the same directory.
    pub fn reopen(self) -> Self {
        let Self { repo, _temp_dir } = self;
        let settings = repo.settings().clone();
        repo.close().expect("Failed to close repository");
        Self {
            repo: Repository::open(settings).expect("Failed to reopen repository"),
            _temp_dir,
        }
    }
}

impl<E: StorageEngine> TestRepository<E> {
    /// Returns the storage directory if LMDB-backed, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.repo.path()
    }
}

impl<E: StorageEngine> std::ops::Deref for TestRepository<E> {
    type Target = TestRepo<E>;

    fn deref(&self) -> &Self::Target {
        &self.repo
    }
}

/// Runs a test with a temporary in-memory repository.
///
/// # Example
///
/// ```rust,ignore
/// use lightstore_testkit::with_temp_repo;
///
/// #[test]
/// fn my_test() {
///     with_temp_repo(|repo| {
///         repo.put(&"a".to_string(), &vec![1]).unwrap();
///     });
/// }
/// ```
pub fn with_temp_repo<F, R>(f: F) -> R
where
    F: FnOnce(&TestRepo<InMemoryEngine>) -> R,
{
    let test_repo = TestRepository::memory();
    f(&test_repo.repo)
}

/// Runs a test with a temporary LMDB-backed repository.
pub fn with_lmdb_repo<F, R>(f: F) -> R
where
    F: FnOnce(&TestRepo, &Path) -> R,
{
    let test_repo = TestRepository::lmdb();
    let path = test_repo
        .path()
        .expect("LMDB repository should have a path")
        .to_path_buf();
    f(&test_repo.repo, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates an in-memory repository holding `count` entries of
    /// `value_size` bytes, keyed by [`key_for`].
    pub fn populated_repository(count: u64, value_size: usize) -> TestRepository<InMemoryEngine> {
        let test_repo = TestRepository::memory();
        test_repo
            .put_many((0..count).map(|i| (key_for(i), value_for(i, value_size))))
            .expect("Failed to populate repository");
        test_repo
    }

    /// Creates an LMDB repository whose map starts at `initial_map_size`,
    /// small enough that filling it forces autogrowth.
    pub fn tight_lmdb_repository(initial_map_size: usize) -> TestRepository<LmdbEngine> {
        TestRepository::lmdb_with(|settings| settings.initial_map_size(initial_map_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_fixture() {
        let repo = TestRepository::memory();
        assert!(repo.path().is_none());
        repo.put(&key_for(1), &value_for(1, 8)).unwrap();
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn lmdb_fixture_reopens() {
        let repo = TestRepository::lmdb();
        assert!(repo.path().is_some_and(Path::exists));
        repo.put(&key_for(7), &value_for(7, 16)).unwrap();

        let repo = repo.reopen();
        assert_eq!(repo.get(&key_for(7)).unwrap(), value_for(7, 16));
    }

    #[test]
    fn keys_sort_numerically() {
        assert!(key_for(9) < key_for(10));
        assert!(key_for(99) < key_for(100));
    }

    #[test]
    fn values_are_deterministic() {
        assert_eq!(value_for(3, 32), value_for(3, 32));
        assert_ne!(value_for(3, 32), value_for(4, 32));
        assert_eq!(value_for(3, 5).len(), 5);
    }

    #[test]
    fn populated_scenario() {
        let repo = scenarios::populated_repository(50, 10);
        assert_eq!(repo.count().unwrap(), 50);
        assert_eq!(repo.get(&key_for(49)).unwrap(), value_for(49, 10));
    }

    #[test]
    fn with_helpers() {
        let count = with_temp_repo(|repo| {
            repo.put(&key_for(0), &vec![0]).unwrap();
            repo.count().unwrap()
        });
        assert_eq!(count, 1);

        with_lmdb_repo(|repo, path| {
            assert_eq!(repo.path(), Some(path));
        });
    }
}

//! Benchmark utilities for LightStore.

#![warn(missing_docs)]

use lightstore_core::{BytesCodec, Repository, RepositorySettings, StringCodec};
use rand::Rng;
use tempfile::TempDir;

/// Repository shape used by the benchmarks.
pub type BenchRepo = Repository<String, Vec<u8>>;

/// Generate random value bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Key for the `i`-th entry; zero-padded so byte order matches `i`.
pub fn key(i: u64) -> String {
    format!("bench-{i:010}")
}

/// Generate `count` entries with random payloads of `payload_size` bytes.
pub fn generate_entries(count: u64, payload_size: usize) -> Vec<(String, Vec<u8>)> {
    (0..count).map(|i| (key(i), random_data(payload_size))).collect()
}

/// Opens an LMDB repository in a fresh temporary directory.
///
/// Commits are not synced so the numbers measure the repository, not the disk.
pub fn open_repo(initial_map_size: usize) -> (TempDir, BenchRepo) {
    let dir = TempDir::new().unwrap();
    let settings = RepositorySettings::new(dir.path().join("store"), StringCodec, BytesCodec)
        .initial_map_size(initial_map_size)
        .sync_on_commit(false);
    let repo = Repository::open(settings).unwrap();
    (dir, repo)
}

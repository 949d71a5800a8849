//! Cross-crate integration test helpers.
//!
//! Provides a harness that mirrors every write into a reference model and
//! checks the repository against it, plus reusable scenario checks.

use crate::fixtures::TestRepo;
use lightstore_core::{LmdbEngine, StorageEngine};
use std::collections::BTreeMap;

/// A test harness for integration testing.
pub struct IntegrationHarness<'a, E: StorageEngine = LmdbEngine> {
    repo: &'a TestRepo<E>,
    /// Expected contents after every write so far.
    model: BTreeMap<String, Vec<u8>>,
}

impl<'a, E: StorageEngine> IntegrationHarness<'a, E> {
    /// Creates a harness over an empty repository.
    pub fn new(repo: &'a TestRepo<E>) -> Self {
        assert_eq!(repo.count().expect("Failed to count"), 0, "Repository must start empty");
        Self {
            repo,
            model: BTreeMap::new(),
        }
    }

    /// Puts an entry and tracks it for later verification.
    pub fn put(&mut self, key: &str, value: Vec<u8>) {
        self.repo
            .put(&key.to_string(), &value)
            .expect("Failed to put entry");
        self.model.insert(key.to_string(), value);
    }

    /// Puts a batch of entries in one transaction and tracks them.
    pub fn put_many(&mut self, entries: Vec<(String, Vec<u8>)>) {
        self.repo
            .put_many(entries.iter().map(|(k, v)| (k, v)))
            .expect("Failed to put batch");
        self.model.extend(entries);
    }

    /// Deletes an entry and updates tracking.
    pub fn delete(&mut self, key: &str) {
        self.repo
            .delete(&key.to_string())
            .expect("Failed to delete entry");
        self.model.remove(key);
    }

    /// Gets an entry and verifies it matches the tracked value.
    pub fn get_and_verify(&self, key: &str) -> Option<Vec<u8>> {
        let actual = self.repo.find(&key.to_string()).expect("Failed to get entry");
        assert_eq!(
            actual.as_ref(),
            self.model.get(key),
            "Entry mismatch for {key:?}"
        );
        actual
    }

    /// Verifies count, point lookups and full iteration against the model.
    pub fn verify_all(&self) {
        assert_eq!(
            self.repo.count().expect("Failed to count"),
            self.model.len() as u64,
            "Entry count mismatch"
        );
        for key in self.model.keys() {
            self.get_and_verify(key);
        }
        let listed: Vec<(String, Vec<u8>)> = self
            .repo
            .list()
            .expect("Failed to list")
            .collect::<Result<_, _>>()
            .expect("Failed to decode entry");
        let expected: Vec<(String, Vec<u8>)> = self
            .model
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        assert_eq!(listed, expected, "Listed entries differ from model");
    }

    /// Returns the count of tracked entries.
    pub fn tracked_count(&self) -> usize {
        self.model.len()
    }
}

/// Transaction behavior checks shared by every engine.
pub mod transaction {
    use super::*;
    use lightstore_core::{RepositoryError, TransactionState};

    /// Verifies that a reader keeps its snapshot while writes commit.
    pub fn test_snapshot_isolation<E: StorageEngine>(repo: &TestRepo<E>) {
        let key = "isolation".to_string();
        repo.put(&key, &b"before".to_vec()).expect("Failed to put");

        let reader = repo.begin_read().expect("Failed to begin read");
        repo.put(&key, &b"after".to_vec()).expect("Failed to overwrite");

        assert_eq!(reader.get(&key).expect("Failed to read"), b"before".to_vec());
        drop(reader);
        assert_eq!(repo.get(&key).expect("Failed to read"), b"after".to_vec());
    }

    /// Verifies that a closed write transaction leaves no trace.
    pub fn test_transaction_abort<E: StorageEngine>(repo: &TestRepo<E>) {
        let before = repo.count().expect("Failed to count");

        let mut txn = repo.begin_write().expect("Failed to begin write");
        txn.put(&"aborted".to_string(), &vec![1, 2, 3]).expect("Failed to put");
        txn.close().expect("Failed to close");
        assert_eq!(txn.state(), TransactionState::Closed);
        assert!(matches!(
            txn.get(&"aborted".to_string()),
            Err(RepositoryError::TransactionClosed)
        ));
        drop(txn);

        assert_eq!(repo.count().expect("Failed to count"), before);
        assert!(!repo.contains(&"aborted".to_string()).expect("Failed to check"));
    }
}

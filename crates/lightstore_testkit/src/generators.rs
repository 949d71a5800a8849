//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, values and operation
//! sequences to run against a repository and a reference model.

use lightstore_core::MAX_KEY_SIZE;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// One write against a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Store a value under a key.
    Put(String, Vec<u8>),
    /// Remove a key (which may be absent).
    Delete(String),
}

impl Operation {
    /// Returns `true` if a repository should accept the operation.
    ///
    /// Puts under an empty or oversized key are rejected; deletes always
    /// succeed.
    pub fn is_accepted(&self) -> bool {
        match self {
            Self::Put(key, _) => !key.is_empty() && key.len() <= MAX_KEY_SIZE,
            Self::Delete(_) => true,
        }
    }

    /// Applies the operation to a reference model. Rejected operations leave
    /// it unchanged.
    pub fn apply(&self, model: &mut BTreeMap<String, Vec<u8>>) {
        if !self.is_accepted() {
            return;
        }
        match self {
            Self::Put(key, value) => {
                model.insert(key.clone(), value.clone());
            }
            Self::Delete(key) => {
                model.remove(key);
            }
        }
    }
}

/// Strategy for generating keys, including the empty key.
///
/// Drawn from a small alphabet so that puts and deletes collide often.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f0-9]{0,6}").expect("Invalid regex")
}

/// Strategy for generating keys a repository can store.
pub fn stored_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f0-9]{1,6}").expect("Invalid regex")
}

/// Strategy for generating values (arbitrary bytes, possibly empty).
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Strategy for generating a single operation (roughly 3 puts per delete).
pub fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (key_strategy(), value_strategy()).prop_map(|(k, v)| Operation::Put(k, v)),
        1 => key_strategy().prop_map(Operation::Delete),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operations_strategy(max_len: usize) -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec(operation_strategy(), 0..=max_len)
}

/// Strategy for generating a batch of distinct entries.
pub fn entries_strategy(max_len: usize) -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(stored_key_strategy(), value_strategy(), 0..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{TestRepo, TestRepository};
    use lightstore_core::{EngineError, GrowthStrategy, RepositoryError, StorageEngine};

    fn check_against_model<E: StorageEngine>(
        repo: &TestRepo<E>,
        ops: &[Operation],
    ) -> Result<(), TestCaseError> {
        let mut model = BTreeMap::new();

        for op in ops {
            match op {
                Operation::Put(key, value) => match repo.put(key, value) {
                    Ok(()) => prop_assert!(op.is_accepted()),
                    Err(RepositoryError::Engine(EngineError::InvalidKey { .. })) => {
                        prop_assert!(!op.is_accepted());
                    }
                    Err(err) => return Err(TestCaseError::fail(err.to_string())),
                },
                Operation::Delete(key) => repo.delete(key).unwrap(),
            }
            op.apply(&mut model);

            for key in ["", "0", "a"] {
                let key = key.to_string();
                prop_assert_eq!(repo.find(&key).unwrap(), model.get(&key).cloned());
            }
        }

        let listed: Vec<(String, Vec<u8>)> = repo.list().unwrap().map(Result::unwrap).collect();
        let expected: Vec<(String, Vec<u8>)> = model.into_iter().collect();
        prop_assert_eq!(repo.count().unwrap(), expected.len() as u64);
        prop_assert_eq!(listed, expected);
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn repository_matches_model(ops in operations_strategy(64)) {
            let repo = TestRepository::memory_with(|s| s.initial_map_size(512).scan_batch_size(3));
            check_against_model(&repo.repo, &ops)?;
        }

        #[test]
        fn batch_put_then_get_many(entries in entries_strategy(40)) {
            let repo = TestRepository::memory_with(|s| {
                s.initial_map_size(256).growth(GrowthStrategy::Fixed(1024))
            });
            repo.put_many(&entries).unwrap();

            let values: Vec<Vec<u8>> = repo
                .get_many(entries.keys())
                .unwrap()
                .map(Result::unwrap)
                .collect();
            let expected: Vec<Vec<u8>> = entries.values().cloned().collect();
            prop_assert_eq!(values, expected);
        }

        #[test]
        fn delete_many_removes_exactly(entries in entries_strategy(30), drop_every in 1usize..4) {
            let repo = TestRepository::memory();
            repo.put_many(&entries).unwrap();

            let doomed: Vec<&String> = entries.keys().step_by(drop_every).collect();
            repo.delete_many(doomed.iter().copied()).unwrap();

            prop_assert_eq!(repo.count().unwrap(), (entries.len() - doomed.len()) as u64);
            for key in entries.keys() {
                prop_assert_eq!(repo.contains(key).unwrap(), !doomed.contains(&key));
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn lmdb_repository_matches_model(ops in operations_strategy(160)) {
            let repo = TestRepository::lmdb_with(|s| {
                s.initial_map_size(64 * 1024)
                    .growth(GrowthStrategy::Fixed(64 * 1024))
                    .scan_batch_size(5)
            });
            check_against_model(&repo.repo, &ops)?;
        }
    }

    #[test]
    fn rejected_put_leaves_model_unchanged() {
        let mut model = BTreeMap::new();
        Operation::Put(String::new(), vec![1]).apply(&mut model);
        assert!(model.is_empty());
        Operation::Delete(String::new()).apply(&mut model);
        assert!(model.is_empty());
    }
}

//! # LightStore Testkit
//!
//! Test utilities for LightStore.
//!
//! This crate provides:
//! - Test fixtures and repository helpers (in-memory and LMDB-backed)
//! - Property-based test generators using proptest
//! - A model-checking harness for cross-crate integration tests
//! - Stress testing utilities for concurrent writers and autogrowth
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lightstore_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_repository() {
//!     with_lmdb_repo(|repo, _path| {
//!         repo.put(&key_for(1), &value_for(1, 32)).unwrap();
//!         assert_eq!(repo.count().unwrap(), 1);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;

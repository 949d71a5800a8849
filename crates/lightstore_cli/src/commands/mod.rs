//! CLI command implementations.

pub mod count;
pub mod delete;
pub mod get;
pub mod info;
pub mod list;
pub mod put;

use lightstore_core::{CborCodec, Repository, RepositorySettings, StringCodec};
use serde_json::Value;
use std::path::Path;

/// Repository shape the CLI operates on.
pub type Store = Repository<String, Value>;

/// Result type shared by every command.
pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Opens the store at `path`.
///
/// Only commands that write are allowed to create a missing store.
pub fn open_store(path: &Path, map_size: Option<usize>, create: bool) -> CliResult<Store> {
    let mut settings = RepositorySettings::new(path, StringCodec, CborCodec::<Value>::new())
        .create_if_missing(create);
    if let Some(size) = map_size {
        settings = settings.initial_map_size(size);
    }
    Ok(Repository::open(settings)?)
}

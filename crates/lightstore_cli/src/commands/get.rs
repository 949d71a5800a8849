//! Get command implementation.

use super::{CliResult, Store};
use std::io::Write;

/// Runs the get command.
///
/// A missing key is an error, so the process exits non-zero.
pub fn run(store: &Store, key: &str, out: &mut impl Write) -> CliResult {
    match store.find(&key.to_string())? {
        Some(value) => {
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
            Ok(())
        }
        None => Err(format!("Key not found: {key}").into()),
    }
}

//! Put command implementation.

use super::{CliResult, Store};
use serde_json::Value;
use std::io::Write;
use tracing::info;

/// Runs the put command.
pub fn run(store: &Store, key: &str, json: &str, out: &mut impl Write) -> CliResult {
    let value: Value =
        serde_json::from_str(json).map_err(|e| format!("Invalid JSON value: {e}"))?;
    store.put(&key.to_string(), &value)?;

    info!(key, map_size = store.map_size(), "stored entry");
    writeln!(out, "Stored {key}")?;
    Ok(())
}

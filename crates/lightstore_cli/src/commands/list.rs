//! List command implementation.

use super::{CliResult, Store};
use serde_json::{Map, Value};
use std::io::Write;

/// Runs the list command.
///
/// Entries are streamed from one snapshot; at most `limit` are printed.
pub fn run(store: &Store, limit: Option<usize>, format: &str, out: &mut impl Write) -> CliResult {
    let entries = store.list()?.take(limit.unwrap_or(usize::MAX));

    match format {
        "json" => {
            let mut object = Map::new();
            for entry in entries {
                let (key, value) = entry?;
                object.insert(key, value);
            }
            writeln!(out, "{}", serde_json::to_string_pretty(&Value::Object(object))?)?;
        }
        _ => {
            for entry in entries {
                let (key, value) = entry?;
                writeln!(out, "{key}\t{value}")?;
            }
        }
    }

    Ok(())
}

//! Delete command implementation.

use super::{CliResult, Store};
use std::io::Write;

/// Runs the delete command.
///
/// All keys are removed in one transaction. Absent keys are skipped.
pub fn run(store: &Store, keys: &[String], out: &mut impl Write) -> CliResult {
    let removed = store.update(|txn| txn.delete_many(keys))?;
    writeln!(out, "Deleted {removed} of {} keys", keys.len())?;
    Ok(())
}

//! Count command implementation.

use super::{CliResult, Store};
use std::io::Write;

/// Runs the count command.
pub fn run(store: &Store, out: &mut impl Write) -> CliResult {
    writeln!(out, "{}", store.count()?)?;
    Ok(())
}

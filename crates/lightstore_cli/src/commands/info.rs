//! Info command implementation.

use super::{CliResult, Store};
use serde::Serialize;
use std::io::Write;

/// Repository inspection result.
#[derive(Debug, Serialize)]
pub struct InfoResult {
    /// Repository path.
    pub path: String,
    /// Current map size in bytes.
    pub map_size: usize,
    /// Size of the data file in bytes.
    pub disk_size: u64,
    /// Number of entries.
    pub entries: u64,
    /// Growth steps taken by this process.
    pub growth_events: u64,
    /// Mapped bytes per entry; absent for an empty repository.
    pub bytes_per_entry: Option<u64>,
}

/// Collects the inspection result.
pub fn inspect(store: &Store) -> CliResult<InfoResult> {
    let stats = store.stats()?;
    Ok(InfoResult {
        path: store
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        map_size: stats.map_size,
        disk_size: store.engine().disk_size(),
        entries: stats.entries,
        growth_events: stats.growth_events,
        bytes_per_entry: stats.bytes_per_entry(),
    })
}

/// Runs the info command.
pub fn run(store: &Store, format: &str, out: &mut impl Write) -> CliResult {
    let result = inspect(store)?;

    match format {
        "json" => {
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        }
        _ => {
            write_text_output(&result, out)?;
        }
    }

    Ok(())
}

fn write_text_output(result: &InfoResult, out: &mut impl Write) -> CliResult {
    writeln!(out, "LightStore Repository")?;
    writeln!(out, "=====================")?;
    writeln!(out)?;
    writeln!(out, "Path: {}", result.path)?;
    writeln!(out)?;
    writeln!(out, "Storage:")?;
    writeln!(out, "  Map size:  {}", format_size(result.map_size as u64))?;
    writeln!(out, "  Disk size: {}", format_size(result.disk_size))?;
    writeln!(out)?;
    writeln!(out, "Entries: {}", result.entries)?;
    match result.bytes_per_entry {
        Some(bytes) => writeln!(out, "Map per entry: {}", format_size(bytes))?,
        None => writeln!(out, "Map per entry: n/a")?,
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

//! LightStore CLI
//!
//! Command-line tools for inspecting and editing a LightStore repository.
//! Keys are UTF-8 strings; values are JSON documents stored as CBOR.
//!
//! # Commands
//!
//! - `info` - Display map size, disk size and entry count
//! - `count` - Print the number of entries
//! - `get` - Print the value stored under a key
//! - `put` - Store a JSON value under a key
//! - `delete` - Remove one or more keys
//! - `list` - Print entries in key order

mod commands;

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LightStore command-line repository tools.
#[derive(Parser)]
#[command(name = "lightstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the repository directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Initial map size in bytes (grown automatically when writes need it)
    #[arg(global = true, short, long)]
    map_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display repository statistics
    Info {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the number of entries
    Count,

    /// Print the value stored under a key
    Get {
        /// Key to look up
        key: String,
    },

    /// Store a JSON value under a key
    Put {
        /// Key to write
        key: String,

        /// Value as a JSON document
        value: String,
    },

    /// Remove one or more keys
    Delete {
        /// Keys to remove
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Print entries in key order
    List {
        /// Maximum number of entries to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("LightStore CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("LightStore Core v{}", lightstore_core::VERSION);
        return Ok(());
    }

    let path = cli.path.ok_or("Repository path required (--path)")?;
    let creates = matches!(cli.command, Commands::Put { .. });
    let store = commands::open_store(&path, cli.map_size, creates)?;
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Info { format } => commands::info::run(&store, &format, &mut out)?,
        Commands::Count => commands::count::run(&store, &mut out)?,
        Commands::Get { key } => commands::get::run(&store, &key, &mut out)?,
        Commands::Put { key, value } => commands::put::run(&store, &key, &value, &mut out)?,
        Commands::Delete { keys } => commands::delete::run(&store, &keys, &mut out)?,
        Commands::List { limit, format } => {
            commands::list::run(&store, limit, &format, &mut out)?;
        }
        Commands::Version => {}
    }

    store.close()?;
    Ok(())
}

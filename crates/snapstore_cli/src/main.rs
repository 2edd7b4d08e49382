//! SnapStore CLI
//!
//! Command-line tools for SnapStore stores.
//!
//! # Commands
//!
//! - `put`, `get`, `delete` - Single-key access
//! - `scan` - List keys under a prefix
//! - `index` - Index the words of a directory tree
//! - `search` - Find indexed files containing a word
//! - `inspect` - Display store statistics

mod commands;
mod config;
mod error;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use config::CliConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SnapStore command-line tools.
#[derive(Parser)]
#[command(name = "snapstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory (overrides `store.path`)
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Configuration file (default: ./snapstore.local.yaml, then ./snapstore.yaml)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value under a key
    Put {
        /// Key
        key: String,
        /// Value
        value: String,
    },

    /// Print the value stored under a key
    Get {
        /// Key
        key: String,
    },

    /// Remove a key
    Delete {
        /// Key
        key: String,
    },

    /// List entries whose key starts with a prefix
    Scan {
        /// Key prefix (empty lists everything)
        #[arg(default_value = "")]
        prefix: String,

        /// Maximum number of entries (0 for no limit)
        #[arg(short, long, default_value = "0")]
        limit: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Index the words of every matching file under a directory
    Index {
        /// Directory to index
        dir: PathBuf,
    },

    /// Find indexed files containing a word
    Search {
        /// Word to look up (case-insensitive)
        word: String,

        /// Maximum number of files (0 for no limit)
        #[arg(short, long, default_value = "0")]
        limit: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Display store statistics
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
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
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("SnapStore CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("SnapStore Core v{}", snapstore_core::VERSION);
        return Ok(());
    }

    let config = CliConfig::load(cli.config.as_deref(), &std::env::current_dir()?)?;
    let store = commands::open_store(&config, cli.path.as_deref())?;

    match cli.command {
        Commands::Put { key, value } => commands::data::put(&store, &key, &value)?,
        Commands::Get { key } => commands::data::get(&store, &key)?,
        Commands::Delete { key } => commands::data::delete(&store, &key)?,
        Commands::Scan {
            prefix,
            limit,
            format,
        } => commands::data::scan(&store, &prefix, limit, format)?,
        Commands::Index { dir } => commands::index::run(&store, &dir, &config.indexer)?,
        Commands::Search {
            word,
            limit,
            format,
        } => commands::search::run(&store, &word, limit, format)?,
        Commands::Inspect { format } => commands::inspect::run(&store, format)?,
        Commands::Version => {}
    }

    store.close()?;
    Ok(())
}

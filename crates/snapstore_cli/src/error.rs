//! CLI error type.

use snapstore_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by `snapstore` commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] CoreError),

    /// The configuration file could not be parsed.
    #[error("invalid config file {}: {source}", path.display())]
    Config {
        /// The offending file.
        path: PathBuf,
        /// The YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Filesystem error outside the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Walking the directory to index failed.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Walking the directory with `.gitignore` rules failed.
    #[error("failed to walk directory: {0}")]
    Ignore(#[from] ignore::Error),

    /// JSON output could not be produced.
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The command line or configuration is incomplete.
    #[error("{0}")]
    Usage(String),
}

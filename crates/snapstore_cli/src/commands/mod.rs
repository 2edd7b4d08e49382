//! CLI command implementations.

pub mod data;
pub mod index;
pub mod inspect;
pub mod search;

use crate::config::CliConfig;
use crate::error::CliResult;
use clap::ValueEnum;
use snapstore_core::Store;
use std::path::Path;

/// Output format for commands that print records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Opens the store named by `--path` or the config file.
pub fn open_store(config: &CliConfig, cli_path: Option<&Path>) -> CliResult<Store> {
    let path = config.store_path(cli_path)?;
    Ok(Store::open_with_config(path, config.store.options.clone())?)
}

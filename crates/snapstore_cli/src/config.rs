//! YAML configuration for the `snapstore` binary.

use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use snapstore_core::StoreConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files tried, in order, when no `--config` is given.
pub const SEARCH_PATHS: [&str; 2] = ["snapstore.local.yaml", "snapstore.yaml"];

/// Top-level configuration file.
///
/// ```yaml
/// store:
///   path: ./data
///   sync_on_write: false
/// indexer:
///   include: [md, txt, rs]
///   exclude:
///     use_git_ignore: true
///     customized: [target, .git]
///   batch_size: 100
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Where and how to open the store.
    pub store: StoreSection,
    /// Settings for the `index` command.
    pub indexer: IndexerConfig,
}

/// `store:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Store directory; `--path` takes precedence.
    pub path: Option<PathBuf>,
    /// Engine options.
    #[serde(flatten)]
    pub options: StoreConfig,
}

/// `indexer:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// File extensions to index, without the dot. Empty means all files.
    pub include: Vec<String>,
    /// Which files to leave out.
    pub exclude: ExcludeConfig,
    /// Documents per batch commit.
    pub batch_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: ExcludeConfig::default(),
            batch_size: 100,
        }
    }
}

/// `indexer.exclude:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeConfig {
    /// Honor `.gitignore` files found in the indexed tree.
    pub use_git_ignore: bool,
    /// Path components to skip, such as `target` or `.git`. Applied in both
    /// modes.
    pub customized: Vec<String>,
}

impl CliConfig {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Otherwise the first of
    /// [`SEARCH_PATHS`] that exists under `base` is used, and defaults
    /// apply when none does.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>, base: &Path) -> CliResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match SEARCH_PATHS.iter().map(|p| base.join(p)).find(|p| p.is_file()) {
            Some(path) => Self::from_file(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parses one YAML file. An empty file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading config");
        Self::parse(&content).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// The store directory, with `--path` overriding the file.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Usage`] if neither names a path.
    pub fn store_path(&self, cli_path: Option<&Path>) -> CliResult<PathBuf> {
        cli_path
            .map(Path::to_path_buf)
            .or_else(|| self.store.path.clone())
            .ok_or_else(|| {
                CliError::Usage("store path required: pass --path or set store.path".into())
            })
    }
}

//! Store configuration.

use serde::{Deserialize, Serialize};
use snapstore_engine::EngineOptions;

/// Configuration for opening a [`crate::Store`].
///
/// Deserializable so callers can embed it in their own config files;
/// missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the engine journal on every write (safer but slower).
    pub sync_on_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Engine options equivalent to this configuration.
    #[must_use]
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::new()
            .create_if_missing(self.create_if_missing)
            .sync_on_write(self.sync_on_write)
    }
}

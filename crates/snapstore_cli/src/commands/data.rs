//! Single-key commands and prefix scans.

use super::OutputFormat;
use crate::error::CliResult;
use serde::Serialize;
use snapstore_core::{KvPair, Store};

/// One scanned entry, rendered as text.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Entry {
    /// Key, lossily decoded as UTF-8.
    pub key: String,
    /// Value, lossily decoded as UTF-8.
    pub value: String,
}

impl From<KvPair> for Entry {
    fn from((key, value): KvPair) -> Self {
        Self {
            key: String::from_utf8_lossy(&key).into_owned(),
            value: String::from_utf8_lossy(&value).into_owned(),
        }
    }
}

/// Runs the put command.
pub fn put(store: &Store, key: &str, value: &str) -> CliResult<()> {
    store.put(key.as_bytes(), value.as_bytes())?;
    Ok(())
}

/// Runs the get command, printing the value or `(not found)`.
pub fn get(store: &Store, key: &str) -> CliResult<()> {
    match store.get(key.as_bytes())? {
        Some(value) => println!("{}", String::from_utf8_lossy(&value)),
        None => println!("(not found)"),
    }
    Ok(())
}

/// Runs the delete command.
pub fn delete(store: &Store, key: &str) -> CliResult<()> {
    store.delete(key.as_bytes())?;
    Ok(())
}

/// Collects the entries printed by the scan command.
pub fn scan_entries(store: &Store, prefix: &str, limit: usize) -> CliResult<Vec<Entry>> {
    Ok(store
        .scan(prefix.as_bytes(), limit)?
        .into_iter()
        .map(Entry::from)
        .collect())
}

/// Runs the scan command.
pub fn scan(store: &Store, prefix: &str, limit: usize, format: OutputFormat) -> CliResult<()> {
    let entries = scan_entries(store, prefix, limit)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for entry in &entries {
                println!("{}\t{}", entry.key, entry.value);
            }
            println!("({} entries)", entries.len());
        }
    }
    Ok(())
}

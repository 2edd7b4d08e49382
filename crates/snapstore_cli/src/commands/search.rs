//! Word lookups against the index, read through a lease.

use super::index::word_key;
use super::OutputFormat;
use crate::error::CliResult;
use serde::Serialize;
use snapstore_core::{CoreError, Store};
use tracing::warn;

/// A file containing the searched word.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SearchHit {
    /// Path relative to the indexed root.
    pub path: String,
    /// Occurrences of the word in the file.
    pub count: u64,
}

/// Finds up to `limit` files containing `word` (0 means no limit).
///
/// All hits come from one snapshot, even while an `index` run commits.
pub fn search(store: &Store, word: &str, limit: usize) -> CliResult<Vec<SearchHit>> {
    let prefix = word_key(&word.to_lowercase(), "");
    let lease = store.get_snapshot().ok_or(CoreError::Closed)?;
    let pairs = lease.scan(prefix.as_bytes(), limit);
    lease.release();

    Ok(pairs?
        .into_iter()
        .filter_map(|(key, value)| {
            let path = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            let raw = String::from_utf8_lossy(&value);
            match raw.parse::<u64>() {
                Ok(count) => Some(SearchHit { path, count }),
                Err(e) => {
                    warn!(%path, value = %raw, error = %e, "skipping index entry with a malformed count");
                    None
                }
            }
        })
        .collect())
}

/// Runs the search command.
pub fn run(store: &Store, word: &str, limit: usize, format: OutputFormat) -> CliResult<()> {
    let hits = search(store, word, limit)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
        OutputFormat::Text => {
            for hit in &hits {
                println!("{}\t{}", hit.count, hit.path);
            }
            println!("({} files)", hits.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_strips_prefix_and_parses_counts() {
        let store = Store::open_in_memory().unwrap();
        store.put(b"w:rust:src/lib.rs", b"4").unwrap();
        store.put(b"w:rust:README.md", b"1").unwrap();
        store.put(b"w:rusty:notes.txt", b"9").unwrap();
        store.take_snapshot().unwrap();

        let hits = search(&store, "Rust", 0).unwrap();
        assert_eq!(
            hits,
            vec![
                SearchHit {
                    path: "README.md".into(),
                    count: 1
                },
                SearchHit {
                    path: "src/lib.rs".into(),
                    count: 4
                },
            ]
        );
        assert_eq!(store.stats().outstanding_leases, 0);
    }

    #[test]
    fn malformed_counts_are_skipped() {
        let store = Store::open_in_memory().unwrap();
        store.put(b"w:word:good.txt", b"3").unwrap();
        store.put(b"w:word:bad.txt", b"three").unwrap();
        store.take_snapshot().unwrap();

        let hits = search(&store, "word", 0).unwrap();
        assert_eq!(
            hits,
            vec![SearchHit {
                path: "good.txt".into(),
                count: 3
            }]
        );
    }

    #[test]
    fn search_reads_current_snapshot_only() {
        let store = Store::open_in_memory().unwrap();
        store.put(b"w:late:a.txt", b"1").unwrap();
        assert!(search(&store, "late", 0).unwrap().is_empty());

        store.take_snapshot().unwrap();
        assert_eq!(search(&store, "late", 0).unwrap().len(), 1);
    }

    #[test]
    fn search_on_closed_store_fails() {
        let store = Store::open_in_memory().unwrap();
        store.close().unwrap();
        assert!(search(&store, "x", 0).is_err());
    }
}

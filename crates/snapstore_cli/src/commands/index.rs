//! Word indexing of a directory tree.
//!
//! Each indexed file contributes one key per distinct word,
//! `w:<word>:<relative path>`, whose value is the decimal occurrence count,
//! plus one `d:<relative path>` key listing those words. Re-indexing a file
//! deletes the word keys it no longer produces in the same batch. Files that
//! disappeared from the tree keep their keys.
//!
//! Documents are written in batches; the store's current snapshot advances
//! after every batch so leases taken by `search` see the new words.

use crate::config::{ExcludeConfig, IndexerConfig};
use crate::error::CliResult;
use ignore::WalkBuilder;
use serde::Serialize;
use snapstore_core::Store;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Key prefix shared by all word entries.
pub const WORD_PREFIX: &str = "w:";

/// Key prefix of the per-document word lists.
pub const DOC_PREFIX: &str = "d:";

const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Summary of one `index` run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Files that passed the include and exclude filters.
    pub matched: usize,
    /// Files parsed and written.
    pub succeeded: usize,
    /// Files that could not be read as UTF-8 text.
    pub failed: usize,
    /// Total word occurrences across succeeded files.
    pub words: usize,
    /// Batch commits issued.
    pub batches: usize,
}

/// A parsed file waiting for the next flush.
struct Document {
    relative: String,
    words: BTreeMap<String, u64>,
}

/// Key under which `word` is recorded for `relative`.
pub fn word_key(word: &str, relative: &str) -> String {
    format!("{WORD_PREFIX}{word}:{relative}")
}

/// Key listing the words last recorded for `relative`.
pub fn doc_key(relative: &str) -> String {
    format!("{DOC_PREFIX}{relative}")
}

/// Splits text into lowercase alphanumeric words with their counts.
pub fn tokenize(text: &str) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        *counts.entry(word.to_lowercase()).or_insert(0) += 1;
    }
    counts
}

fn is_excluded(path: &Path, root: &Path, components: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .any(|c| components.iter().any(|e| OsStr::new(e) == c.as_os_str()))
}

fn is_included(path: &Path, include: &[String]) -> bool {
    if include.is_empty() {
        return true;
    }
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| include.iter().any(|inc| inc.eq_ignore_ascii_case(ext)))
}

/// Lists the files under `root` that pass the filters, sorted.
pub fn matching_files(root: &Path, config: &IndexerConfig) -> CliResult<Vec<PathBuf>> {
    let mut files = if config.exclude.use_git_ignore {
        git_ignore_walk(root, &config.exclude)?
    } else {
        component_walk(root, &config.exclude)?
    };
    files.retain(|path| is_included(path, &config.include));
    files.sort();
    Ok(files)
}

fn component_walk(root: &Path, exclude: &ExcludeConfig) -> CliResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_excluded(e.path(), root, &exclude.customized));
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Walks `root` honoring `.gitignore` files, inside a git repository or not.
/// The `.git` directory itself is always skipped.
fn git_ignore_walk(root: &Path, exclude: &ExcludeConfig) -> CliResult<Vec<PathBuf>> {
    let filter_root = root.to_path_buf();
    let mut skipped = exclude.customized.clone();
    skipped.push(".git".to_owned());

    let mut files = Vec::new();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .git_ignore(true)
        .require_git(false)
        .follow_links(false)
        .filter_entry(move |e| !is_excluded(e.path(), &filter_root, &skipped))
        .build();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_some_and(|t| t.is_file()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn relative_name(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn flush(store: &Store, pending: &mut Vec<Document>, report: &mut IndexReport) -> CliResult<()> {
    if pending.is_empty() {
        return Ok(());
    }
    let mut batch = store.batch();
    for doc in pending.iter() {
        let list_key = doc_key(&doc.relative);
        if let Some(previous) = store.get(list_key.as_bytes())? {
            for word in String::from_utf8_lossy(&previous).lines() {
                if !doc.words.contains_key(word) {
                    batch.delete(word_key(word, &doc.relative).as_bytes());
                }
            }
        }
        for (word, count) in &doc.words {
            let key = word_key(word, &doc.relative);
            batch.put(key.as_bytes(), count.to_string().as_bytes());
        }
        let list: Vec<&str> = doc.words.keys().map(String::as_str).collect();
        batch.put(list_key.as_bytes(), list.join("\n").as_bytes());
    }
    debug!(documents = pending.len(), ops = batch.len(), "committing index batch");
    batch.commit()?;
    store.take_snapshot()?;
    report.batches += 1;
    pending.clear();
    Ok(())
}

/// Indexes every matching file under `root`.
///
/// Unreadable or non-UTF-8 files are counted as failed and skipped.
pub fn index(store: &Store, root: &Path, config: &IndexerConfig) -> CliResult<IndexReport> {
    info!(root = %root.display(), "indexing");
    let files = matching_files(root, config)?;
    let total = files.len();
    info!(matched = total, "files matched");

    let batch_size = config.batch_size.max(1);
    let mut report = IndexReport {
        matched: total,
        ..IndexReport::default()
    };
    let mut pending = Vec::with_capacity(batch_size);
    let mut last_progress = Instant::now();

    for (n, path) in files.iter().enumerate() {
        match fs::read_to_string(path) {
            Ok(text) => {
                let words = tokenize(&text);
                report.succeeded += 1;
                report.words += words.values().sum::<u64>() as usize;
                pending.push(Document {
                    relative: relative_name(path, root),
                    words,
                });
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable file");
                report.failed += 1;
            }
        }

        if pending.len() >= batch_size {
            flush(store, &mut pending, &mut report)?;
        }

        if last_progress.elapsed() > PROGRESS_INTERVAL || n + 1 == total {
            last_progress = Instant::now();
            info!(
                done = n + 1,
                total,
                succeeded = report.succeeded,
                failed = report.failed,
                words = report.words,
                "indexing progress"
            );
        }
    }
    flush(store, &mut pending, &mut report)?;

    info!(
        matched = report.matched,
        succeeded = report.succeeded,
        failed = report.failed,
        words = report.words,
        batches = report.batches,
        "indexing finished"
    );
    Ok(report)
}

/// Runs the index command.
pub fn run(store: &Store, root: &Path, config: &IndexerConfig) -> CliResult<()> {
    let report = index(store, root, config)?;
    println!(
        "{} files matched, {} indexed, {} failed, {} words",
        report.matched, report.succeeded, report.failed, report.words
    );
    Ok(())
}

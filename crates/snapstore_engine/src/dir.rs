//! Engine directory layout and locking.
//!
//! ```text
//! <path>/
//! ├─ LOCK          # Advisory lock for single-writer
//! └─ journal.log   # Framed journal of committed writes
//! ```

use crate::error::{EngineError, EngineResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.log";

/// An engine directory held under an exclusive lock.
///
/// The lock lives as long as this value; dropping it closes the lock file,
/// which releases the lock.
#[derive(Debug)]
pub struct EngineDir {
    path: PathBuf,
    _lock_file: File,
}

impl EngineDir {
    /// Opens (and optionally creates) the directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the directory is missing and
    ///   `create_if_missing` is false
    /// - [`EngineError::Locked`] if another handle holds the lock
    /// - I/O errors, including `path` existing as a plain file
    pub fn open(path: &Path, create_if_missing: bool) -> EngineResult<Self> {
        if !path.exists() {
            if !create_if_missing {
                return Err(EngineError::NotFound(path.to_path_buf()));
            }
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a directory: {}", path.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(EngineError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the journal file.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let dir = EngineDir::open(&path, true).unwrap();
        assert!(path.is_dir());
        assert_eq!(dir.journal_path(), path.join("journal.log"));
    }

    #[test]
    fn missing_directory_without_create_fails() {
        let temp = tempdir().unwrap();
        let result = EngineDir::open(&temp.path().join("absent"), false);
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let _first = EngineDir::open(temp.path(), true).unwrap();
        assert!(matches!(
            EngineDir::open(temp.path(), true),
            Err(EngineError::Locked)
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        drop(EngineDir::open(temp.path(), true).unwrap());
        assert!(EngineDir::open(temp.path(), true).is_ok());
    }

    #[test]
    fn plain_file_is_rejected() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(EngineDir::open(&file, true), Err(EngineError::Io(_))));
    }
}

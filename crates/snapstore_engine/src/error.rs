//! Error types for engine operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur inside the ordered key-value engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The journal contains data that cannot be decoded.
    #[error("journal corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the engine directory lock.
    #[error("engine locked: another process has exclusive access")]
    Locked,

    /// The engine has been closed.
    #[error("engine is closed")]
    Closed,

    /// The engine directory does not exist and creation was not requested.
    #[error("engine directory does not exist: {}", .0.display())]
    NotFound(PathBuf),

    /// A key, value or record exceeds the journal's 4-byte length fields.
    #[error("record too large: {len} bytes")]
    RecordTooLarge {
        /// The offending length in bytes.
        len: usize,
    },
}

impl EngineError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}

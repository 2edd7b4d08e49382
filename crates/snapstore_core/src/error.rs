//! Error types for store operations.

use snapstore_engine::EngineError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by [`crate::Store`], [`crate::Batch`] and
/// [`crate::Lease`].
///
/// Engine failures are wrapped with the operation that hit them and are
/// never retried here. A missing key is not an error: reads return
/// `Ok(None)`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// `close` was called on a store that is already closed.
    #[error("store is already closed")]
    AlreadyClosed,

    /// `close` found snapshots pinned by outstanding leases.
    ///
    /// Release the leases and call `close` again.
    #[error("cannot close store: {snapshots} snapshot(s) live, {leases} lease(s) outstanding")]
    SnapshotsStillActive {
        /// Distinct snapshots in the registry, the current one included.
        snapshots: usize,
        /// Caller-held leases across all snapshots.
        leases: usize,
    },

    /// The path could not be resolved or the engine could not be opened.
    #[error("failed to open engine at {}: {source}", path.display())]
    EngineOpen {
        /// The path that was being opened.
        path: PathBuf,
        /// The underlying engine error.
        #[source]
        source: EngineError,
    },

    /// A read hit an engine failure.
    #[error("failed to read data: {0}")]
    EngineRead(#[source] EngineError),

    /// A put, delete or batch commit hit an engine failure.
    #[error("failed to write data: {0}")]
    EngineWrite(#[source] EngineError),

    /// The engine could not create a snapshot.
    #[error("failed to create snapshot: {0}")]
    SnapshotCreate(#[source] EngineError),

    /// A prefix scan failed; no partial results are returned.
    #[error("scan failed: {0}")]
    Scan(#[source] EngineError),

    /// The engine reported an error while closing. The store is closed
    /// regardless.
    #[error("failed to close engine: {0}")]
    EngineClose(#[source] EngineError),

    /// Read through a lease that was already released.
    #[error("lease has been released")]
    LeaseReleased,
}

impl CoreError {
    /// Returns true for [`CoreError::SnapshotsStillActive`], the one failure
    /// that a later retry of the same call can cure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SnapshotsStillActive { .. })
    }
}

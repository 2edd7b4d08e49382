//! # SnapStore Core
//!
//! Snapshot lifecycle layer over an ordered key-value engine.
//!
//! This crate provides:
//! - [`Store`], the facade owning one engine and its current snapshot
//! - [`Lease`], a caller-held pin giving snapshot-isolated reads
//! - [`Batch`], atomic multi-key writes
//! - Bounded prefix scans over the live engine or a lease
//!
//! Plain reads go to the live engine and always see the latest writes.
//! Snapshot isolation is opt-in: take a lease, read through it, release it.
//!
//! ## Example
//!
//! ```rust
//! use snapstore_core::Store;
//!
//! let store = Store::open_in_memory().unwrap();
//! store.put(b"doc:1", b"hello").unwrap();
//! store.put(b"doc:2", b"world").unwrap();
//! store.take_snapshot().unwrap();
//!
//! let docs = store.scan(b"doc:", 0).unwrap();
//! assert_eq!(docs.len(), 2);
//!
//! let lease = store.get_snapshot().unwrap();
//! store.delete(b"doc:1").unwrap();
//! assert_eq!(lease.scan(b"doc:", 0).unwrap().len(), 2);
//! assert_eq!(store.scan(b"doc:", 0).unwrap().len(), 1);
//!
//! lease.release();
//! store.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod error;
mod lease;
mod registry;
mod scan;
mod store;

pub use batch::Batch;
pub use config::StoreConfig;
pub use error::{CoreError, CoreResult};
pub use lease::Lease;
pub use registry::{ReleaseOutcome, SnapshotRegistry};
pub use store::{Store, StoreStats};

pub use snapstore_engine::{KvPair, SequenceNumber, SnapshotId};

/// SnapStore version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # SnapStore Engine
//!
//! Ordered, durable key-value engine consumed by `snapstore_core`.
//!
//! The crate exposes the engine contract as two traits,
//! [`OrderedEngine`] and [`EngineSnapshot`], and one implementation,
//! [`Engine`]:
//!
//! - Keys and values are arbitrary byte strings kept in ascending order
//! - Writes (single or batched) are appended to a checksummed journal and
//!   replayed on open
//! - Every key carries a version chain, so snapshots and iterators see a
//!   stable point-in-time view while writes continue
//! - Snapshots hold engine resources until released
//!
//! ## Example
//!
//! ```rust
//! use snapstore_engine::{Engine, OrderedEngine, WriteBatch};
//!
//! let engine = Engine::open_in_memory().unwrap();
//! let mut batch = WriteBatch::new();
//! batch.put(b"user:1".to_vec(), b"alice".to_vec());
//! batch.put(b"user:2".to_vec(), b"bob".to_vec());
//! engine.write_batch(batch).unwrap();
//!
//! let users: Vec<_> = engine
//!     .iter_prefix(b"user:")
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(users.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod dir;
mod engine;
mod error;
mod journal;
mod memtable;
mod options;
mod record;
mod snapshot;
mod traits;
mod types;

pub use batch::{BatchOp, WriteBatch};
pub use engine::{Engine, EngineStats};
pub use error::{EngineError, EngineResult};
pub use journal::{FileDevice, JournalDevice, MemoryDevice};
pub use options::EngineOptions;
pub use snapshot::{MvccSnapshot, PrefixIter};
pub use traits::{EngineSnapshot, KvIter, OrderedEngine};
pub use types::{KvPair, SequenceNumber, SnapshotId};

//! Bounded draining of engine iterators.

use snapstore_engine::{EngineResult, KvIter, KvPair};

/// Collects up to `limit` pairs from `iter`; a `limit` of 0 means no bound.
///
/// The first error aborts the collection and discards everything gathered
/// so far. Iteration stops as soon as the limit is met, so entries past it
/// are never read.
pub(crate) fn collect_prefix(iter: KvIter<'_>, limit: usize) -> EngineResult<Vec<KvPair>> {
    let bound = if limit == 0 { usize::MAX } else { limit };
    iter.take(bound).collect()
}

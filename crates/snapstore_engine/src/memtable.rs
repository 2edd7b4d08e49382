//! Multi-version in-memory table.

use crate::batch::BatchOp;
use crate::types::{KvPair, SequenceNumber};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::Bound;

/// One committed version of a key. `None` is a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Version {
    seq: SequenceNumber,
    value: Option<Vec<u8>>,
}

/// Versions of a single key, newest first.
#[derive(Debug, Clone, Default)]
pub struct VersionChain {
    versions: VecDeque<Version>,
}

impl VersionChain {
    /// Adds a version newer than every existing one.
    fn push(&mut self, seq: SequenceNumber, value: Option<Vec<u8>>) {
        debug_assert!(self.versions.front().map_or(true, |v| v.seq <= seq));
        // A batch writing the same key twice keeps only its last write.
        if let Some(front) = self.versions.front_mut() {
            if front.seq == seq {
                front.value = value;
                return;
            }
        }
        self.versions.push_front(Version { seq, value });
    }

    /// Value visible to a reader at `seq`.
    fn visible_at(&self, seq: SequenceNumber) -> Option<&[u8]> {
        self.versions
            .iter()
            .find(|v| v.seq <= seq)
            .and_then(|v| v.value.as_deref())
    }

    /// Drops versions no reader can observe.
    ///
    /// Readers exist at `oldest_pin` and above, plus the live reader at the
    /// head. Everything older than the newest version at or below the oldest
    /// pin is unreachable. Returns the number of versions removed.
    fn collect(&mut self, oldest_pin: Option<SequenceNumber>) -> usize {
        let keep = match oldest_pin {
            None => 1,
            Some(pin) => match self.versions.iter().position(|v| v.seq <= pin) {
                Some(idx) => idx + 1,
                None => self.versions.len(),
            },
        };
        let removed = self.versions.len().saturating_sub(keep);
        self.versions.truncate(keep.max(1));
        removed
    }

    /// True when the chain is a lone tombstone: every reader sees nothing.
    fn is_dead(&self) -> bool {
        self.versions.len() == 1 && self.versions[0].value.is_none()
    }

    /// True when collection may still shrink this chain.
    fn is_reclaimable(&self) -> bool {
        self.versions.len() > 1 || self.is_dead()
    }

    /// Number of stored versions.
    #[must_use]
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }
}

/// Ordered map of keys to version chains.
///
/// `reclaimable` tracks keys whose chains carry history or a tombstone, so
/// garbage collection touches only those instead of the whole table.
#[derive(Debug, Default)]
pub struct MemTable {
    entries: BTreeMap<Vec<u8>, VersionChain>,
    reclaimable: BTreeSet<Vec<u8>>,
}

impl MemTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a committed batch at `seq`.
    pub fn apply(&mut self, seq: SequenceNumber, ops: &[BatchOp]) {
        for op in ops {
            let (key, value) = match op {
                BatchOp::Put { key, value } => (key, Some(value.clone())),
                BatchOp::Delete { key } => (key, None),
            };
            if value.is_none() && !self.entries.contains_key(key.as_slice()) {
                continue;
            }
            let chain = self.entries.entry(key.clone()).or_default();
            chain.push(seq, value);
            if chain.is_reclaimable() {
                self.reclaimable.insert(key.clone());
            }
        }
    }

    /// Value of `key` as seen at `seq`.
    #[must_use]
    pub fn get(&self, key: &[u8], seq: SequenceNumber) -> Option<Vec<u8>> {
        self.entries
            .get(key)
            .and_then(|chain| chain.visible_at(seq))
            .map(<[u8]>::to_vec)
    }

    /// First pair at `seq` whose key starts with `prefix` and sorts after
    /// `after` (or at the prefix start when `after` is `None`).
    #[must_use]
    pub fn next_visible(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
        seq: SequenceNumber,
    ) -> Option<KvPair> {
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Included(prefix),
        };
        self.entries
            .range::<[u8], _>((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .find_map(|(key, chain)| chain.visible_at(seq).map(|v| (key.clone(), v.to_vec())))
    }

    /// Reclaims versions invisible to every reader at or above `oldest_pin`.
    ///
    /// Returns the number of versions dropped.
    pub fn collect_garbage(&mut self, oldest_pin: Option<SequenceNumber>) -> usize {
        let keys: Vec<Vec<u8>> = self.reclaimable.iter().cloned().collect();
        keys.iter()
            .map(|key| self.collect_key(key, oldest_pin))
            .sum()
    }

    /// Like [`Self::collect_garbage`], restricted to the keys of `ops`.
    pub fn collect_touched(&mut self, ops: &[BatchOp], oldest_pin: Option<SequenceNumber>) -> usize {
        ops.iter()
            .map(|op| self.collect_key(op.key(), oldest_pin))
            .sum()
    }

    fn collect_key(&mut self, key: &[u8], oldest_pin: Option<SequenceNumber>) -> usize {
        let Some(chain) = self.entries.get_mut(key) else {
            self.reclaimable.remove(key);
            return 0;
        };
        let mut removed = chain.collect(oldest_pin);
        if chain.is_dead() {
            removed += 1;
            self.entries.remove(key);
            self.reclaimable.remove(key);
        } else if !chain.is_reclaimable() {
            self.reclaimable.remove(key);
        }
        removed
    }

    /// Number of keys with a live value at `seq`.
    #[must_use]
    pub fn live_keys(&self, seq: SequenceNumber) -> usize {
        self.entries
            .values()
            .filter(|chain| chain.visible_at(seq).is_some())
            .count()
    }

    /// Total versions held, tombstones included.
    #[must_use]
    pub fn version_count(&self) -> usize {
        self.entries.values().map(VersionChain::version_count).sum()
    }
}

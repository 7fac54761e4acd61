//! The candidate set: a cheap, necessary-but-not-sufficient membership test
//! over rolling-hash values, used to decide whether a B-byte window is worth
//! the cost of a strong-hash lookup against the block-location index.

use std::collections::HashSet;

/// A set of 32-bit rolling-hash values of known blocks.
///
/// Backed by a plain hash set rather than a probabilistic Bloom filter: the
/// repository's index already bounds the number of distinct blocks, and an
/// exact set keeps the false-positive rate at zero instead of merely "low",
/// which simplifies reasoning about the `< 1 in 10^4` verification-failure
/// budget in the spec down to "strong-hash collisions only".
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    values: HashSet<u32>,
}

impl CandidateSet {
    pub fn new() -> Self {
        CandidateSet::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        CandidateSet {
            values: HashSet::with_capacity(capacity),
        }
    }

    /// Builds a candidate set from an iterator of rolling-hash values, e.g.
    /// the index's `rolling_hashes()` at session start.
    pub fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        CandidateSet {
            values: iter.into_iter().collect(),
        }
    }

    #[inline]
    pub fn contains(&self, hash: u32) -> bool {
        self.values.contains(&hash)
    }

    /// Adds a newly discovered block's rolling hash so later bytes in the
    /// same ingest can match against it.
    pub fn insert(&mut self, hash: u32) {
        self.values.insert(hash);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

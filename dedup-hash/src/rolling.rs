//! The rolling-hash engine: a cheap, incrementally-updatable hash over a
//! sliding B-byte window, used to prefilter candidate block matches before
//! paying for a strong-hash comparison.
//!
//! The scheme is a base-256 polynomial hash evaluated modulo 2^32 (plain
//! `Wrapping<u32>` arithmetic gives us the modulus for free). Its exact bit
//! pattern is persisted in the block-location index and shared across
//! processes, so it is pinned here rather than left to a third-party crate
//! whose internals could drift between versions.

use std::collections::VecDeque;
use std::num::Wrapping;

const BASE: Wrapping<u32> = Wrapping(256);

/// Maintains the rolling hash of the most recent `block_size` bytes fed to it.
#[derive(Debug, Clone)]
pub struct RollingHash {
    block_size: usize,
    /// `BASE^(block_size - 1)`, the weight of the byte about to leave the window.
    high_order_weight: Wrapping<u32>,
    window: VecDeque<u8>,
    hash: Wrapping<u32>,
}

impl RollingHash {
    /// Creates a new engine for a window of `block_size` bytes.
    ///
    /// Panics if `block_size` is 0.
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "block_size must be positive");
        let mut high_order_weight = Wrapping(1u32);
        for _ in 0..block_size - 1 {
            high_order_weight *= BASE;
        }
        RollingHash {
            block_size,
            high_order_weight,
            window: VecDeque::with_capacity(block_size),
            hash: Wrapping(0),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Feeds one more byte into the window, evicting the oldest byte once
    /// the window is full.
    pub fn feed(&mut self, byte: u8) {
        if self.window.len() == self.block_size {
            let leaving = self.window.pop_front().expect("window is full");
            self.hash -= Wrapping(leaving as u32) * self.high_order_weight;
        }
        self.hash = self.hash * BASE + Wrapping(byte as u32);
        self.window.push_back(byte);
    }

    /// `true` once at least `block_size` bytes have been fed.
    pub fn is_primed(&self) -> bool {
        self.window.len() == self.block_size
    }

    /// The rolling hash of the last `block_size` bytes fed, or `None` if
    /// fewer than `block_size` bytes have been fed yet.
    pub fn current(&self) -> Option<u32> {
        self.is_primed().then_some(self.hash.0)
    }

    /// Resets to the empty window, as if newly constructed.
    pub fn reset(&mut self) {
        self.window.clear();
        self.hash = Wrapping(0);
    }
}

/// Computes the rolling hash of a known, complete `block_size`-byte buffer in
/// one pass. Must agree with [`RollingHash`] fed the same bytes incrementally.
///
/// Panics if `data.len() != block_size`.
pub fn hash_block(block_size: usize, data: &[u8]) -> u32 {
    assert_eq!(
        data.len(),
        block_size,
        "hash_block requires exactly block_size bytes"
    );
    let mut hash = Wrapping(0u32);
    for &byte in data {
        hash = hash * BASE + Wrapping(byte as u32);
    }
    hash.0
}


#[cfg(test)]
mod proptests {
    use proptest::{prop_assert_eq, proptest};

    use super::*;

    proptest! {
        /// Feeding an arbitrary stream incrementally always agrees with a
        /// bulk hash of whatever `block_size` bytes are currently in the
        /// window, for every block size the data is long enough to prime.
        #[test]
        fn incremental_matches_bulk_for_any_stream(data: Vec<u8>, block_size in 1usize..8) {
            let mut rh = RollingHash::new(block_size);
            for &byte in &data {
                rh.feed(byte);
            }
            if data.len() >= block_size {
                let tail = &data[data.len() - block_size..];
                prop_assert_eq!(rh.current().unwrap(), hash_block(block_size, tail));
            } else {
                prop_assert_eq!(rh.current(), None);
            }
        }

        /// Two independent engines fed the same bytes always land on the
        /// same hash: the rolling hash is a pure function of window content,
        /// never of prior window history once the window itself agrees.
        #[test]
        fn identical_windows_hash_identically(window: Vec<u8>, prefix_a: Vec<u8>, prefix_b: Vec<u8>) {
            let block_size = window.len().max(1);
            let window = if window.is_empty() { vec![0u8] } else { window };

            let mut rh_a = RollingHash::new(block_size);
            for &b in prefix_a.iter().chain(window.iter()) {
                rh_a.feed(b);
            }
            let mut rh_b = RollingHash::new(block_size);
            for &b in prefix_b.iter().chain(window.iter()) {
                rh_b.feed(b);
            }
            prop_assert_eq!(rh_a.current(), rh_b.current());
        }
    }
}

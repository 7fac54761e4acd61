//! Hash primitives for the deduplication core.
//!
//! This crate provides the two hash notions the recipe finder depends on:
//!
//! - [`StrongHash`] — the 128-bit authoritative digest of a run of bytes,
//!   used to name blobs and blocks and to verify every candidate match.
//! - [`RollingHash`] — a cheap incremental hash over a sliding B-byte
//!   window, used only as a prefilter.
//!
//! [`CandidateSet`] is the in-memory structure that turns a rolling-hash
//! value into a yes/maybe answer before a strong-hash lookup is attempted.
//!
//! No IO, no knowledge of blobs or recipes: this is a pure, dependency-light
//! leaf crate, the same role `harmonia-utils-hash` plays for Harmonia.

mod candidates;
mod rolling;
mod strong;

pub use candidates::CandidateSet;
pub use rolling::{RollingHash, hash_block};
pub use strong::{ParseStrongHashError, STRONG_HASH_SIZE, StrongHash, StrongHashContext};

//! The finder's view of the repository's existing knowledge: the candidate
//! prefilter, the persistent block-location index, and a way to read bytes
//! back from an already-committed blob for verification.
//!
//! `dedup-finder` does not depend on `dedup-index` directly — the repository
//! layer owns the actual `rusqlite`/filesystem machinery and implements this
//! trait over it, keeping the finder itself free of I/O concerns.

use dedup_core::{DedupError, StrongHash};

/// Everything the finder needs to know about blocks the repository has seen
/// before this ingest began.
pub trait BlockSource {
    /// Cheap membership test over rolling-hash values. `false` means
    /// "definitely not a match"; `true` means "worth a strong-hash lookup".
    fn is_candidate(&self, rolling_hash: u32) -> bool;

    /// All known `(source_blob_id, offset)` locations for `strong_hash`,
    /// ordered so the first entry is the one a deterministic finder should
    /// prefer when nothing breaks the tie.
    fn locations(&self, strong_hash: &StrongHash) -> Result<Vec<(StrongHash, u64)>, DedupError>;

    /// Reads `size` bytes at `offset` from the blob `blob_id`, for
    /// verifying a strong-hash match before trusting it.
    ///
    /// A transient failure here should be reported as
    /// [`DedupError::StoreUnavailable`] so the finder can treat the
    /// candidate as a non-match and keep scanning, rather than fail the
    /// whole ingest.
    fn read_at(&self, blob_id: &StrongHash, offset: u64, size: u64) -> Result<Vec<u8>, DedupError>;
}

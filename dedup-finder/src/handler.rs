//! The piece-handler contract: the collaborator that stores original byte
//! runs discovered mid-stream and reports back where they landed.

use dedup_core::{DedupError, StrongHash};

/// Receives the bytes of one original run and reports where they were
/// stored.
///
/// Called in strict order for a given piece index: one [`init_piece`],
/// any number of [`add_piece_data`], then exactly one [`end_piece`].
/// [`RecipeFinder`](crate::RecipeFinder) is generic over this trait rather
/// than using a trait object, so a concrete handler (e.g. a filesystem blob
/// store) is monomorphized into the hot byte-scanning loop.
///
/// [`init_piece`]: PieceHandler::init_piece
/// [`add_piece_data`]: PieceHandler::add_piece_data
/// [`end_piece`]: PieceHandler::end_piece
pub trait PieceHandler {
    /// Begins original piece number `index` (its eventual position in the
    /// recipe's `pieces` list).
    fn init_piece(&mut self, index: usize) -> Result<(), DedupError>;

    /// Appends more bytes to the piece currently open. May be called any
    /// number of times, including zero.
    fn add_piece_data(&mut self, index: usize, bytes: &[u8]) -> Result<(), DedupError>;

    /// Finalizes the piece, returning the blob it landed in and the offset
    /// within that blob where its bytes begin.
    fn end_piece(&mut self, index: usize) -> Result<(StrongHash, u64), DedupError>;
}

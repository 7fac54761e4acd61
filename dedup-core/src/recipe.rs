//! The recipe: the reconstruction plan emitted for one ingested stream.

use dedup_hash::StrongHash;
use serde::{Deserialize, Serialize};

/// One segment of a recipe.
///
/// Concatenating the bytes described by each piece, in order, reproduces the
/// stream the recipe was built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    /// Blob to read from: a strong hash identifying a committed blob.
    pub source: StrongHash,
    /// Starting byte offset within that blob.
    pub offset: u64,
    /// Number of bytes to read starting at `offset`.
    pub size: u64,
    /// The `size` bytes are emitted this many times consecutively.
    ///
    /// Always 1 today; reserved for a future run-length extension and must
    /// be preserved verbatim by any code that round-trips a recipe.
    pub repeat: u32,
    /// `true` iff these bytes were freshly stored during this ingest.
    pub original: bool,
}

impl Piece {
    pub fn original(source: StrongHash, offset: u64, size: u64) -> Self {
        Piece {
            source,
            offset,
            size,
            repeat: 1,
            original: true,
        }
    }

    pub fn referenced(source: StrongHash, offset: u64, size: u64) -> Self {
        Piece {
            source,
            offset,
            size,
            repeat: 1,
            original: false,
        }
    }

    /// Total bytes this piece contributes to the reconstructed stream.
    pub fn contributed_bytes(&self) -> u64 {
        self.size * self.repeat as u64
    }
}

/// The reconstruction plan for one logical input stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Strong hash of the full reconstructed stream.
    pub md5sum: StrongHash,
    /// Total byte length of the stream.
    pub size: u64,
    /// Always the literal string `"concat"`; reserved for future methods.
    pub method: String,
    /// Ordered pieces; concatenating their bytes reproduces the stream.
    pub pieces: Vec<Piece>,
}

impl Recipe {
    pub const METHOD_CONCAT: &'static str = "concat";

    pub fn new(md5sum: StrongHash, size: u64, pieces: Vec<Piece>) -> Self {
        Recipe {
            md5sum,
            size,
            method: Self::METHOD_CONCAT.to_string(),
            pieces,
        }
    }

    /// A recipe for the empty stream: no pieces, the well-known empty digest.
    pub fn empty() -> Self {
        Recipe::new(StrongHash::of_empty(), 0, Vec::new())
    }

    /// Sum of `size * repeat` across all pieces; must equal `size` (Testable
    /// Property 2).
    pub fn pieces_total_size(&self) -> u64 {
        self.pieces.iter().map(Piece::contributed_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_recipe_matches_spec_constant() {
        let recipe = Recipe::empty();
        assert_eq!(recipe.size, 0);
        assert!(recipe.pieces.is_empty());
        assert_eq!(recipe.md5sum.to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn pieces_total_size_accounts_for_repeat() {
        let h = StrongHash::digest("aaa");
        let mut piece = Piece::referenced(h, 0, 3);
        piece.repeat = 4;
        let recipe = Recipe::new(h, 12, vec![piece]);
        assert_eq!(recipe.pieces_total_size(), 12);
    }

    #[test]
    fn serializes_with_contractual_field_names() {
        let h = StrongHash::digest("aaa");
        let recipe = Recipe::new(h, 3, vec![Piece::referenced(h, 0, 3)]);
        let json = serde_json::to_value(&recipe).unwrap();
        assert_eq!(json["method"], "concat");
        assert_eq!(json["size"], 3);
        assert_eq!(json["pieces"][0]["original"], false);
        assert_eq!(json["pieces"][0]["repeat"], 1);
    }
}

//! Pure data types and the error model shared by the deduplication core.
//!
//! This crate is intentionally IO-free: no filesystem, no database, no
//! network. It exists so the finder, the index and the repository layers
//! can agree on what a block location, a piece, a recipe and an error look
//! like without depending on each other's I/O machinery — the same role
//! `harmonia-store-core` plays for Harmonia's store types.

mod config;
mod error;
mod location;
mod recipe;

pub use config::{DEFAULT_BLOCK_SIZE, RepositoryConfig};
pub use dedup_hash::StrongHash;
pub use error::{DedupError, IoContext, Result};
pub use location::BlockLocation;
pub use recipe::{Piece, Recipe};

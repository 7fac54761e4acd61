//! Error type for index operations, and its conversion into the core
//! [`DedupError`] kinds the rest of the crate family shares.

use std::path::PathBuf;

use dedup_core::DedupError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to open index database at '{path}': {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("index database not found at: {0}")]
    DatabaseNotFound(PathBuf),
}

/// A SQLite lookup that comes back empty means "no locations for this hash",
/// not a failure; an actual SQLite error reading/writing the index is the
/// closest fit to the core's `StoreUnavailable` kind, since callers (the
/// finder) are expected to treat it as "skip this candidate", not as fatal.
impl From<IndexError> for DedupError {
    fn from(err: IndexError) -> Self {
        DedupError::store_unavailable(err.to_string())
    }
}

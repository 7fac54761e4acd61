//! The core error model. Every variant below is one of the five error kinds
//! the dedup core distinguishes; layers above (the index, the finder, the
//! repository) convert their own internal failures into one of these rather
//! than inventing new kinds.

use dedup_hash::StrongHash;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DedupError>;

#[derive(Error, Debug)]
pub enum DedupError {
    /// `feed` called after `close`, or `get_recipe` called before `close`.
    /// Programmer error against the finder's state machine; fatal.
    #[error("bad input order: {0}")]
    BadInputOrder(String),

    /// A strong-hash match was confirmed against the index but the
    /// verification read disagreed with the stored content. Indicates index
    /// or store corruption; fatal, surfaced to the caller.
    #[error("index inconsistency for block {strong_hash}: {detail}")]
    IndexInconsistency {
        strong_hash: StrongHash,
        detail: String,
    },

    /// Transient I/O failure reading a candidate location. Non-fatal: the
    /// finder treats this as "no match" and continues scanning, so a
    /// recipe is never made incorrect by a `StoreUnavailable`, only less
    /// deduplicated.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The ingest controller's commit could not linearize against
    /// concurrent commits, even after retrying.
    #[error("commit conflict after {attempts} attempt(s): {detail}")]
    CommitConflict { attempts: u32, detail: String },

    /// Invalid repository configuration, surfaced immediately at open time.
    #[error("invalid repository configuration: {0}")]
    UserError(String),

    /// Wrapped I/O failure with human-readable context, for failures that
    /// don't fit one of the kinds above (e.g. writing a new blob to disk).
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl DedupError {
    pub fn bad_input_order(message: impl Into<String>) -> Self {
        DedupError::BadInputOrder(message.into())
    }

    pub fn index_inconsistency(strong_hash: StrongHash, detail: impl Into<String>) -> Self {
        DedupError::IndexInconsistency {
            strong_hash,
            detail: detail.into(),
        }
    }

    pub fn store_unavailable(detail: impl Into<String>) -> Self {
        DedupError::StoreUnavailable(detail.into())
    }

    pub fn commit_conflict(attempts: u32, detail: impl Into<String>) -> Self {
        DedupError::CommitConflict {
            attempts,
            detail: detail.into(),
        }
    }

    pub fn user_error(message: impl Into<String>) -> Self {
        DedupError::UserError(message.into())
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        DedupError::Io {
            message: message.into(),
            source,
        }
    }
}

/// Attaches human-readable context to a raw `std::io::Error`, mirroring the
/// `IoContext` helper trait the teacher crate uses for its own daemon error
/// type.
pub trait IoContext<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| DedupError::io(f(), e))
    }
}

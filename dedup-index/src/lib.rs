//! Persistent block-location index.
//!
//! A `rusqlite`-backed map from strong block hash to the (blob, offset)
//! locations it has been seen at, supporting atomic staged commits so a new
//! ingest's discoveries become visible together with the blobs that back
//! them — never a dangling reference, never an orphaned blob.
//!
//! This crate plays the role `harmonia-store-db` plays for Harmonia: the
//! database layer, kept separate from the pure types (`dedup-core`) and
//! from the streaming algorithm that drives it (`dedup-finder`).

mod connection;
mod error;
mod query;
mod schema;
mod staging;

pub use connection::{BlockIndex, OpenMode};
pub use error::{IndexError, Result};
pub use schema::SCHEMA_VERSION;
pub use staging::IndexTransaction;

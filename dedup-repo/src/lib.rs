//! Repository wiring for the deduplication core.
//!
//! Ties together [`dedup_core::RepositoryConfig`], the persistent
//! [`dedup_index::BlockIndex`], the in-memory candidate set, and a content
//! store, behind one [`Repository`] handle — the unit the CLI and
//! integration tests drive an ingest against. Plays the role a combination
//! of `harmonia-daemon::config`, `harmonia-store-db` and a local store
//! backend jointly play for the teacher crate.

mod blob_store;
mod repository;

pub use blob_store::FileBlobStore;
pub use repository::Repository;

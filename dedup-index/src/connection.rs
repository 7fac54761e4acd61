//! Opening and configuring the index database.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::error::{IndexError, Result};
use crate::schema::SCHEMA_SQL;

/// How the index database should be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Fail if the database does not already exist.
    ReadWrite,
    /// Create the database (and schema) if it doesn't exist yet.
    Create,
}

/// The persistent block-location index.
///
/// Backed by a `rusqlite` connection to a SQLite database, one row per
/// `(strong_hash, source_blob_id, offset)` triple plus a `blobs` table
/// recording which blobs have been committed. Foreign keys enforce that a
/// block location can never reference a blob that doesn't exist.
pub struct BlockIndex {
    pub(crate) conn: Connection,
}

impl BlockIndex {
    /// Opens (or creates) the index database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        match mode {
            OpenMode::ReadWrite => {
                if !path.exists() {
                    return Err(IndexError::DatabaseNotFound(path.to_owned()));
                }
            }
            OpenMode::Create => {}
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| IndexError::DatabaseOpen {
            path: path.to_owned(),
            source: e,
        })?;
        let index = BlockIndex { conn };
        index.configure_pragmas()?;
        index.create_schema()?;
        debug!("opened block index at {} ({:?})", path.display(), mode);
        Ok(index)
    }

    /// An in-memory index database, for tests and short-lived sessions.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let index = BlockIndex { conn };
        index.configure_pragmas()?;
        index.create_schema()?;
        debug!("created in-memory block index");
        Ok(index)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Raw connection access, for advanced callers (e.g. the repository
    /// layer opening its own transactions that span the index and other
    /// repository-level bookkeeping).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

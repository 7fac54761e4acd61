//! Staged writes to the index, committed or rolled back atomically.

use dedup_core::BlockLocation;
use rusqlite::params;

use crate::connection::BlockIndex;
use crate::error::Result;

/// A batch of index additions staged under one SQLite transaction.
///
/// Nothing staged here is visible to [`BlockIndex::get_locations`] or
/// [`BlockIndex::rolling_hashes`] (both read outside any open transaction)
/// until [`IndexTransaction::commit`] returns. Dropping the transaction
/// without committing rolls it back, matching the spec's "uncommitted
/// staging is discarded on reopen" rule for the in-process case.
pub struct IndexTransaction<'a> {
    tx: rusqlite::Transaction<'a>,
}

impl BlockIndex {
    /// Begins a staged batch of additions. Ingest controllers call this once
    /// per ingest and add every newly discovered block location plus every
    /// newly stored blob before committing.
    pub fn begin(&mut self) -> Result<IndexTransaction<'_>> {
        Ok(IndexTransaction {
            tx: self.conn.transaction()?,
        })
    }
}

impl<'a> IndexTransaction<'a> {
    /// Marks `blob_id` as committed. Must precede any `add_block` call that
    /// references it, so the foreign key check passes within this
    /// transaction.
    pub fn add_blob(&self, blob_id: &dedup_core::StrongHash) -> Result<()> {
        self.tx.execute(
            "INSERT OR IGNORE INTO blobs (blob_id) VALUES (?1)",
            params![blob_id.to_hex()],
        )?;
        Ok(())
    }

    /// Records a block location. Idempotent by
    /// `(strong_hash, source_blob_id, offset)`.
    pub fn add_block(&self, location: &BlockLocation, rolling_hash: u32) -> Result<()> {
        self.tx.execute(
            r#"
            INSERT OR IGNORE INTO blocks (strong_hash, source_blob_id, offset, rolling_hash)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                location.strong_hash.to_hex(),
                location.source_blob_id.to_hex(),
                location.offset as i64,
                rolling_hash,
            ],
        )?;
        Ok(())
    }

    /// Makes every staged addition visible atomically.
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    /// Discards every staged addition. Equivalent to dropping `self`, spelled
    /// out for callers that want the intent explicit.
    pub fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::BlockIndex;
    use dedup_core::StrongHash;

    #[test]
    fn uncommitted_staging_is_invisible() {
        let mut index = BlockIndex::open_memory().unwrap();
        let blob = StrongHash::digest("aaa");
        let loc = BlockLocation::new(StrongHash::digest("aaa"), blob, 0);
        {
            let staged = index.begin().unwrap();
            staged.add_blob(&blob).unwrap();
            staged.add_block(&loc, 42).unwrap();
            // dropped without commit
        }
        assert!(index.get_locations(&loc.strong_hash).unwrap().is_empty());
    }

    #[test]
    fn commit_makes_staging_visible() {
        let mut index = BlockIndex::open_memory().unwrap();
        let blob = StrongHash::digest("aaa");
        let loc = BlockLocation::new(StrongHash::digest("aaa"), blob, 0);
        {
            let staged = index.begin().unwrap();
            staged.add_blob(&blob).unwrap();
            staged.add_block(&loc, 42).unwrap();
            staged.commit().unwrap();
        }
        let found = index.get_locations(&loc.strong_hash).unwrap();
        assert_eq!(found, vec![(blob, 0)]);
    }

    #[test]
    fn explicit_rollback_discards_staging() {
        let mut index = BlockIndex::open_memory().unwrap();
        let blob = StrongHash::digest("aaa");
        let loc = BlockLocation::new(StrongHash::digest("aaa"), blob, 0);
        let staged = index.begin().unwrap();
        staged.add_blob(&blob).unwrap();
        staged.add_block(&loc, 42).unwrap();
        staged.rollback().unwrap();
        assert!(index.get_locations(&loc.strong_hash).unwrap().is_empty());
    }

    #[test]
    fn add_block_is_idempotent() {
        let mut index = BlockIndex::open_memory().unwrap();
        let blob = StrongHash::digest("aaa");
        let loc = BlockLocation::new(StrongHash::digest("aaa"), blob, 0);
        let staged = index.begin().unwrap();
        staged.add_blob(&blob).unwrap();
        staged.add_block(&loc, 42).unwrap();
        staged.add_block(&loc, 42).unwrap();
        staged.commit().unwrap();
        assert_eq!(index.get_locations(&loc.strong_hash).unwrap().len(), 1);
    }
}

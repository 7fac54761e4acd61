//! Read-only queries against committed index state.

use dedup_core::StrongHash;
use rusqlite::params;

use crate::connection::BlockIndex;
use crate::error::Result;

impl BlockIndex {
    /// All known `(source_blob_id, offset)` locations for `strong_hash`,
    /// ordered by `(source_blob_id, offset)` ascending — the lexicographically
    /// smallest source is first, giving the finder a deterministic starting
    /// point for match extension without having to sort it itself.
    pub fn get_locations(&self, strong_hash: &StrongHash) -> Result<Vec<(StrongHash, u64)>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT source_blob_id, offset FROM blocks
            WHERE strong_hash = ?1
            ORDER BY source_blob_id ASC, offset ASC
            "#,
        )?;
        let mut rows = stmt.query(params![strong_hash.to_hex()])?;
        let mut locations = Vec::new();
        while let Some(row) = rows.next()? {
            let blob_hex: String = row.get(0)?;
            let offset: i64 = row.get(1)?;
            let blob_id: StrongHash = blob_hex
                .parse()
                .expect("blob_id stored by add_blob is always a valid strong hash");
            locations.push((blob_id, offset as u64));
        }
        Ok(locations)
    }

    /// The rolling-hash value of every known block, used to seed a
    /// [`dedup_hash::CandidateSet`] at session start.
    pub fn rolling_hashes(&self) -> Result<Vec<u32>> {
        let mut stmt = self.conn.prepare_cached("SELECT rolling_hash FROM blocks")?;
        let mut rows = stmt.query([])?;
        let mut hashes = Vec::new();
        while let Some(row) = rows.next()? {
            hashes.push(row.get::<_, i64>(0)? as u32);
        }
        Ok(hashes)
    }

    /// Whether `blob_id` has been committed to the index.
    pub fn has_blob(&self, blob_id: &StrongHash) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM blobs WHERE blob_id = ?1 LIMIT 1")?;
        Ok(stmt.exists(params![blob_id.to_hex()])?)
    }

    /// Number of distinct blocks recorded (for diagnostics/tests).
    pub fn count_blocks(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use dedup_core::BlockLocation;

    #[rstest]
    #[case::ascending(vec![0, 5, 10])]
    #[case::descending(vec![10, 5, 0])]
    #[case::interleaved(vec![5, 0, 10])]
    fn get_locations_orders_ascending_regardless_of_insertion_order(#[case] offsets: Vec<u64>) {
        let mut index = BlockIndex::open_memory().unwrap();
        let hash = StrongHash::digest("aaa");
        let blob = StrongHash::digest("blob");
        let staged = index.begin().unwrap();
        staged.add_blob(&blob).unwrap();
        for &offset in &offsets {
            staged
                .add_block(&BlockLocation::new(hash, blob, offset), 1)
                .unwrap();
        }
        staged.commit().unwrap();

        let mut expected = offsets.clone();
        expected.sort();
        let actual: Vec<u64> = index
            .get_locations(&hash)
            .unwrap()
            .into_iter()
            .map(|(_, offset)| offset)
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn get_locations_orders_deterministically() {
        let mut index = BlockIndex::open_memory().unwrap();
        let hash = StrongHash::digest("aaa");
        let blob_z = StrongHash::digest("zzz-blob");
        let blob_a = StrongHash::digest("aaa-blob");
        let staged = index.begin().unwrap();
        staged.add_blob(&blob_z).unwrap();
        staged.add_blob(&blob_a).unwrap();
        staged
            .add_block(&BlockLocation::new(hash, blob_z, 5), 1)
            .unwrap();
        staged
            .add_block(&BlockLocation::new(hash, blob_a, 0), 1)
            .unwrap();
        staged.commit().unwrap();

        let locations = index.get_locations(&hash).unwrap();
        assert_eq!(locations.len(), 2);
        assert!(locations[0].0 < locations[1].0);
    }

    #[test]
    fn rolling_hashes_collects_every_block() {
        let mut index = BlockIndex::open_memory().unwrap();
        let blob = StrongHash::digest("blob");
        let staged = index.begin().unwrap();
        staged.add_blob(&blob).unwrap();
        staged
            .add_block(&BlockLocation::new(StrongHash::digest("a"), blob, 0), 111)
            .unwrap();
        staged
            .add_block(&BlockLocation::new(StrongHash::digest("b"), blob, 1), 222)
            .unwrap();
        staged.commit().unwrap();

        let mut hashes = index.rolling_hashes().unwrap();
        hashes.sort();
        assert_eq!(hashes, vec![111, 222]);
    }

    #[test]
    fn has_blob_reflects_commits_only() {
        let mut index = BlockIndex::open_memory().unwrap();
        let blob = StrongHash::digest("blob");
        assert!(!index.has_blob(&blob).unwrap());
        let staged = index.begin().unwrap();
        staged.add_blob(&blob).unwrap();
        staged.commit().unwrap();
        assert!(index.has_blob(&blob).unwrap());
    }
}

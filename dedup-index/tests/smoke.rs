//! Smoke tests for the block-location index, using an in-memory database.

use dedup_core::{BlockLocation, StrongHash};
use dedup_index::{BlockIndex, OpenMode};

#[test]
fn reopen_creates_schema_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.sqlite");
    {
        let _index = BlockIndex::open(&path, OpenMode::Create).unwrap();
    }
    // Reopening an existing file in ReadWrite mode must not recreate it.
    let index = BlockIndex::open(&path, OpenMode::ReadWrite).unwrap();
    assert_eq!(index.count_blocks().unwrap(), 0);
}

#[test]
fn open_read_write_requires_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.sqlite");
    let err = BlockIndex::open(&path, OpenMode::ReadWrite).unwrap_err();
    assert!(matches!(err, dedup_index::IndexError::DatabaseNotFound(_)));
}

#[test]
fn staged_locations_survive_a_real_file_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.sqlite");
    let blob = StrongHash::digest("aaa");
    let loc = BlockLocation::new(StrongHash::digest("aaa"), blob, 0);

    {
        let mut index = BlockIndex::open(&path, OpenMode::Create).unwrap();
        let staged = index.begin().unwrap();
        staged.add_blob(&blob).unwrap();
        staged.add_block(&loc, 12345).unwrap();
        staged.commit().unwrap();
    }

    let index = BlockIndex::open(&path, OpenMode::ReadWrite).unwrap();
    assert_eq!(index.get_locations(&loc.strong_hash).unwrap(), vec![(blob, 0)]);
    assert_eq!(index.rolling_hashes().unwrap(), vec![12345]);
}

#[test]
fn block_location_requires_its_blob_to_exist() {
    let mut index = BlockIndex::open_memory().unwrap();
    let orphan_blob = StrongHash::digest("never-committed");
    let loc = BlockLocation::new(StrongHash::digest("aaa"), orphan_blob, 0);
    let staged = index.begin().unwrap();
    let result = staged.add_block(&loc, 1);
    assert!(result.is_err(), "foreign key should reject an unknown blob");
}

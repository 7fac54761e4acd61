//! The reference blob store: a content-addressable filesystem directory,
//! one file per blob named by its strong hash.
//!
//! This is the "reference piece-handler/blob-store implementation" the
//! expanded spec calls for — sufficient to drive the core end-to-end, not a
//! full backup-tool storage engine. Writes go through a temp-file-then-rename
//! sequence so a partially written blob is never visible under its final
//! name, mirroring the teacher's preference for atomic renames over
//! in-place writes when persisting store content.

use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dedup_core::{DedupError, IoContext, StrongHash};

/// Number of whole-blob byte buffers the tail cache keeps around.
///
/// Bounded by entry count, not total bytes, following the teacher's
/// preference for simple bounded caches over elaborate eviction policies —
/// good enough to avoid re-reading the same blob's tail for back-to-back
/// verification reads against it during one ingest.
const TAIL_CACHE_CAPACITY: usize = 32;

/// A small bounded cache of recently read whole-blob contents, evicted
/// oldest-first once it grows past [`TAIL_CACHE_CAPACITY`].
#[derive(Default)]
struct TailCache {
    order: VecDeque<StrongHash>,
    entries: std::collections::HashMap<StrongHash, Vec<u8>>,
}

impl TailCache {
    fn get(&self, blob_id: &StrongHash) -> Option<&Vec<u8>> {
        self.entries.get(blob_id)
    }

    fn insert(&mut self, blob_id: StrongHash, bytes: Vec<u8>) {
        if self.entries.contains_key(&blob_id) {
            return;
        }
        if self.order.len() >= TAIL_CACHE_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(blob_id);
        self.entries.insert(blob_id, bytes);
    }
}

/// A local filesystem content store, keyed by strong hash.
pub struct FileBlobStore {
    dir: PathBuf,
    tail_cache: Mutex<TailCache>,
}

impl FileBlobStore {
    /// Opens (creating if necessary) a blob store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DedupError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .io_context(|| format!("creating blob store directory {}", dir.display()))?;
        Ok(FileBlobStore {
            dir,
            tail_cache: Mutex::new(TailCache::default()),
        })
    }

    fn blob_path(&self, blob_id: &StrongHash) -> PathBuf {
        self.dir.join(blob_id.to_hex())
    }

    /// `true` if a blob with this id has already been written to disk.
    pub fn exists(&self, blob_id: &StrongHash) -> bool {
        self.blob_path(blob_id).exists()
    }

    /// Writes `bytes` as a new blob and returns its strong hash.
    ///
    /// Idempotent: content addressing means writing the same bytes twice is
    /// a no-op the second time, so re-storing an already-known blob (e.g. a
    /// piece handler that happens to re-derive the same bytes) never
    /// clobbers anything mid-write.
    pub fn write_blob(&self, bytes: &[u8]) -> Result<StrongHash, DedupError> {
        let blob_id = StrongHash::digest(bytes);
        let path = self.blob_path(&blob_id);
        if path.exists() {
            return Ok(blob_id);
        }
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .io_context(|| format!("creating temp file in {}", self.dir.display()))?;
        tmp.write_all(bytes)
            .io_context(|| format!("writing blob {blob_id} to temp file"))?;
        tmp.flush()
            .io_context(|| format!("flushing blob {blob_id} temp file"))?;
        tmp.persist(&path)
            .map_err(|e| DedupError::io(format!("renaming temp file to blob {blob_id}"), e.error))?;
        Ok(blob_id)
    }

    /// Reads `size` bytes at `offset` from blob `blob_id`.
    ///
    /// A missing blob, a range past its end, or any other I/O failure is
    /// reported as [`DedupError::StoreUnavailable`] rather than propagated
    /// as a hard error: the finder treats this as "skip this candidate",
    /// never as a reason to fail the whole ingest. Goes through
    /// [`read_all`](Self::read_all)'s cache rather than seeking the file
    /// directly — match extension calls this once per byte per surviving
    /// candidate, so warming the whole blob into memory on first touch
    /// beats reopening the file for every probe.
    pub fn read_at(&self, blob_id: &StrongHash, offset: u64, size: u64) -> Result<Vec<u8>, DedupError> {
        let bytes = self
            .read_all(blob_id)
            .map_err(|e| DedupError::store_unavailable(e.to_string()))?;
        let start = offset as usize;
        let end = start + size as usize;
        if end > bytes.len() {
            return Err(DedupError::store_unavailable(format!(
                "read past end of blob {blob_id}"
            )));
        }
        Ok(bytes[start..end].to_vec())
    }

    /// Reads a whole blob's contents, caching it for subsequent `read_at`
    /// calls against the same blob.
    pub fn read_all(&self, blob_id: &StrongHash) -> Result<Vec<u8>, DedupError> {
        if let Some(cached) = self.tail_cache.lock().unwrap().get(blob_id) {
            return Ok(cached.clone());
        }
        let path = self.blob_path(blob_id);
        let bytes = fs::read(&path)
            .io_context(|| format!("reading blob {blob_id} from {}", path.display()))?;
        self.tail_cache
            .lock()
            .unwrap()
            .insert(*blob_id, bytes.clone());
        Ok(bytes)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_all_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path().join("blobs")).unwrap();
        let id = store.write_blob(b"hello world").unwrap();
        assert_eq!(id, StrongHash::digest(b"hello world"));
        assert_eq!(store.read_all(&id).unwrap(), b"hello world");
    }

    #[test]
    fn write_blob_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path().join("blobs")).unwrap();
        let first = store.write_blob(b"abc").unwrap();
        let second = store.write_blob(b"abc").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn read_at_returns_a_slice() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path().join("blobs")).unwrap();
        let id = store.write_blob(b"XXXaaa").unwrap();
        assert_eq!(store.read_at(&id, 3, 3).unwrap(), b"aaa");
    }

    #[test]
    fn read_at_missing_blob_is_store_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path().join("blobs")).unwrap();
        let missing = StrongHash::digest(b"never written");
        let err = store.read_at(&missing, 0, 1).unwrap_err();
        assert!(matches!(err, DedupError::StoreUnavailable(_)));
    }

    #[test]
    fn exists_reflects_written_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path().join("blobs")).unwrap();
        let id = StrongHash::digest(b"z");
        assert!(!store.exists(&id));
        store.write_blob(b"z").unwrap();
        assert!(store.exists(&id));
    }
}

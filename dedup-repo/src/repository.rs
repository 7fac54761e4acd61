//! The repository: the on-disk unit owning configuration, the index and the
//! blob store for one deduplication domain. The candidate set and index are
//! threaded through this explicit handle, never a process-wide global.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Mutex, RwLock};

use dedup_core::{BlockLocation, DedupError, IoContext, Recipe, RepositoryConfig, StrongHash};
use dedup_finder::{PieceHandler, RecipeFinder};
use dedup_hash::{CandidateSet, RollingHash};
use dedup_index::{BlockIndex, OpenMode};

use crate::blob_store::FileBlobStore;

const CONFIG_FILE_NAME: &str = "config.toml";
const INDEX_FILE_NAME: &str = "index.sqlite";
const BLOBS_DIR_NAME: &str = "blobs";

/// Owns configuration, the persistent block-location index, the candidate
/// set and the blob store for one repository directory.
///
/// The block-location index and blob directory are guarded by one
/// [`Mutex`], following the teacher's single-writer SQLite usage pattern:
/// true multi-process/distributed serialization is a deployment concern
/// layered on top, not reimplemented here, since distributed replication is
/// an explicit non-goal.
pub struct Repository {
    root: PathBuf,
    config: RepositoryConfig,
    index: Mutex<BlockIndex>,
    candidates: RwLock<CandidateSet>,
    blob_store: FileBlobStore,
}

impl Repository {
    /// Creates a new repository at `root`, or, if one already exists there,
    /// validates that `config` matches what it was created with.
    ///
    /// A block size (or dedup flag) mismatch against an already-initialized
    /// repository is a [`DedupError::UserError`]: the block size in
    /// particular must stay fixed for the lifetime of the index, so
    /// silently accepting a different value would corrupt every existing
    /// rolling hash's meaning.
    pub fn create(root: impl Into<PathBuf>, config: RepositoryConfig) -> Result<Self, DedupError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .io_context(|| format!("creating repository directory {}", root.display()))?;

        let config_path = root.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            let existing = load_config(&config_path)?;
            if existing.block_size != config.block_size {
                return Err(DedupError::user_error(format!(
                    "repository at {} was created with block_size={}, cannot reinitialize with block_size={}",
                    root.display(),
                    existing.block_size,
                    config.block_size
                )));
            }
            if existing.enable_deduplication != config.enable_deduplication {
                return Err(DedupError::user_error(format!(
                    "repository at {} was created with enable_deduplication={}, cannot reinitialize with enable_deduplication={}",
                    root.display(),
                    existing.enable_deduplication,
                    config.enable_deduplication
                )));
            }
        } else {
            save_config(&config_path, &config)?;
        }

        tracing::info!(
            path = %root.display(),
            block_size = config.block_size,
            enable_deduplication = config.enable_deduplication,
            "creating repository"
        );
        Self::open_with(root, config)
    }

    /// Opens an already-created repository, loading its persisted
    /// configuration from `config.toml`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DedupError> {
        let root = root.into();
        let config = load_config(&root.join(CONFIG_FILE_NAME))?;
        Self::open_with(root, config)
    }

    fn open_with(root: PathBuf, config: RepositoryConfig) -> Result<Self, DedupError> {
        let index = BlockIndex::open(root.join(INDEX_FILE_NAME), OpenMode::Create)
            .map_err(DedupError::from)?;
        let candidates = CandidateSet::from_iter(index.rolling_hashes().map_err(DedupError::from)?);
        let blob_store = FileBlobStore::open(root.join(BLOBS_DIR_NAME))?;

        tracing::debug!(
            path = %root.display(),
            known_blocks = candidates.len(),
            "repository opened"
        );
        Ok(Repository {
            root,
            config,
            index: Mutex::new(index),
            candidates: RwLock::new(candidates),
            blob_store,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> RepositoryConfig {
        self.config
    }

    pub fn blob_store(&self) -> &FileBlobStore {
        &self.blob_store
    }

    /// Ingests an in-memory byte slice. A thin convenience over
    /// [`ingest_reader`](Self::ingest_reader) for callers that already have
    /// the whole stream in memory (mainly tests).
    pub fn ingest_bytes(&self, input: &[u8]) -> Result<Recipe, DedupError> {
        self.ingest_reader(std::io::Cursor::new(input))
    }

    /// Ingests a stream of unbounded length, producing a recipe and
    /// committing every newly discovered block location and blob.
    ///
    /// Reads the source in bounded chunks rather than all at once, so a
    /// large input file is never held in memory in full (only the finder's
    /// own bounded undecided-run buffer is).
    pub fn ingest_reader<R: Read>(&self, mut reader: R) -> Result<Recipe, DedupError> {
        let session = IngestSession::new(self);
        let mut finder = RecipeFinder::new(
            self.config.block_size,
            self.config.enable_deduplication,
            session.clone(),
            session.clone(),
        );

        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader
                .read(&mut buf)
                .io_context(|| "reading ingest input".to_string())?;
            if n == 0 {
                break;
            }
            finder.feed(&buf[..n])?;
        }
        finder.close()?;
        let recipe = finder.get_recipe()?;
        if recipe.pieces.is_empty() {
            // The empty stream produces no pieces, so there is nothing for
            // `commit_ingest` to stage a blob for — but §8 S6 still expects
            // the well-known empty-content blob to exist in the store
            // afterwards. It is deliberately not registered in the index's
            // `blobs` table: nothing ever references it, so doing so would
            // make it an orphan rather than resolve one.
            self.blob_store.write_blob(&[])?;
        }
        self.commit_ingest(&recipe)?;
        Ok(recipe)
    }

    /// Stages and commits every block discovered by this ingest: the
    /// matches the finder already confirmed (whose blobs and locations are
    /// already committed from a prior ingest) plus every B-byte window
    /// inside the originals just stored, so a future ingest can dedup
    /// against bytes this one introduced (§4.6).
    fn commit_ingest(&self, recipe: &Recipe) -> Result<(), DedupError> {
        let block_size = self.config.block_size as usize;
        let mut index = self.index.lock().unwrap();
        let staged = index.begin().map_err(DedupError::from)?;

        for piece in &recipe.pieces {
            staged.add_blob(&piece.source).map_err(DedupError::from)?;
        }

        let mut discovered = Vec::new();
        for piece in recipe.pieces.iter().filter(|p| p.original) {
            if piece.size < block_size as u64 {
                continue;
            }
            let bytes = self
                .blob_store
                .read_at(&piece.source, piece.offset, piece.size)?;
            let mut rolling = RollingHash::new(block_size);
            for (i, &byte) in bytes.iter().enumerate() {
                rolling.feed(byte);
                let Some(rolling_hash) = rolling.current() else {
                    continue;
                };
                let window_start = i + 1 - block_size;
                let window = &bytes[window_start..window_start + block_size];
                let strong_hash = StrongHash::digest(window);
                let location = BlockLocation::new(
                    strong_hash,
                    piece.source,
                    piece.offset + window_start as u64,
                );
                staged.add_block(&location, rolling_hash).map_err(DedupError::from)?;
                discovered.push(rolling_hash);
            }
        }

        staged.commit().map_err(DedupError::from)?;
        drop(index);

        tracing::debug!(
            md5sum = %recipe.md5sum,
            pieces = recipe.pieces.len(),
            blocks_discovered = discovered.len(),
            "ingest committed"
        );
        if !discovered.is_empty() {
            let mut candidates = self.candidates.write().unwrap();
            for rolling_hash in discovered {
                candidates.insert(rolling_hash);
            }
        }
        Ok(())
    }
}

fn load_config(path: &Path) -> Result<RepositoryConfig, DedupError> {
    let contents = std::fs::read_to_string(path)
        .io_context(|| format!("reading repository configuration at {}", path.display()))?;
    toml::from_str(&contents)
        .map_err(|e| DedupError::user_error(format!("invalid repository configuration: {e}")))
}

fn save_config(path: &Path, config: &RepositoryConfig) -> Result<(), DedupError> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| DedupError::user_error(format!("serializing repository configuration: {e}")))?;
    std::fs::write(path, contents)
        .io_context(|| format!("writing repository configuration at {}", path.display()))
}

/// The finder's view of one ingest: reads consult the repository's
/// committed state (index lookups, blob verification reads), writes buffer
/// original-run bytes in memory until the finder finalizes each piece.
///
/// Implements both [`BlockSource`](dedup_finder::BlockSource) and
/// [`PieceHandler`] over a shared `Rc<RefCell<_>>`, the same pattern
/// `dedup-finder`'s own test double (`SharedRepository`) uses, so the finder
/// is handed two cheap clones of one handle rather than splitting state
/// across two owned types.
struct IngestSessionInner<'r> {
    repo: &'r Repository,
    open_pieces: RefCell<HashMap<usize, Vec<u8>>>,
}

struct IngestSession<'r>(Rc<IngestSessionInner<'r>>);

impl<'r> IngestSession<'r> {
    fn new(repo: &'r Repository) -> Self {
        IngestSession(Rc::new(IngestSessionInner {
            repo,
            open_pieces: RefCell::new(HashMap::new()),
        }))
    }
}

impl<'r> Clone for IngestSession<'r> {
    fn clone(&self) -> Self {
        IngestSession(Rc::clone(&self.0))
    }
}

impl<'r> dedup_finder::BlockSource for IngestSession<'r> {
    fn is_candidate(&self, rolling_hash: u32) -> bool {
        self.0.repo.candidates.read().unwrap().contains(rolling_hash)
    }

    fn locations(&self, strong_hash: &StrongHash) -> Result<Vec<(StrongHash, u64)>, DedupError> {
        let index = self.0.repo.index.lock().unwrap();
        index.get_locations(strong_hash).map_err(DedupError::from)
    }

    fn read_at(&self, blob_id: &StrongHash, offset: u64, size: u64) -> Result<Vec<u8>, DedupError> {
        self.0.repo.blob_store.read_at(blob_id, offset, size)
    }
}

impl<'r> PieceHandler for IngestSession<'r> {
    fn init_piece(&mut self, index: usize) -> Result<(), DedupError> {
        self.0.open_pieces.borrow_mut().insert(index, Vec::new());
        Ok(())
    }

    fn add_piece_data(&mut self, index: usize, bytes: &[u8]) -> Result<(), DedupError> {
        self.0
            .open_pieces
            .borrow_mut()
            .get_mut(&index)
            .expect("init_piece always precedes add_piece_data for the same index")
            .extend_from_slice(bytes);
        Ok(())
    }

    fn end_piece(&mut self, index: usize) -> Result<(StrongHash, u64), DedupError> {
        let bytes = self
            .0
            .open_pieces
            .borrow_mut()
            .remove(&index)
            .expect("init_piece always precedes end_piece for the same index");
        let blob_id = self.0.repo.blob_store.write_blob(&bytes)?;
        Ok((blob_id, 0))
    }
}

//! The recipe finder: the streaming state machine that turns a byte stream
//! into a recipe of original and referenced pieces.

use dedup_core::{DedupError, Piece, Recipe, StrongHash};
use dedup_hash::{RollingHash, StrongHashContext};

use crate::handler::PieceHandler;
use crate::source::BlockSource;

/// Bytes of undecided original content the finder will buffer before
/// handing a chunk to the piece handler mid-stream, so long inputs don't
/// have to be held in memory all at once.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 64 * 1024;

/// State kept while a confirmed block match is being extended as far as it
/// will go past its initial `block_size` bytes — a confirmed match is not
/// necessarily emitted as a bare `block_size`-byte piece; the finder keeps
/// comparing subsequent input bytes against every surviving candidate
/// location and only settles the piece once every candidate has diverged or
/// the stream ends.
struct ExtendState {
    /// The longest successful extension seen so far: the smallest
    /// `(source_blob_id, offset)` among whichever candidates were still
    /// alive at that length, paired with how many bytes they matched.
    /// Always up to date — refreshed every byte while at least one
    /// candidate survives, frozen at its last value once all of them die.
    best: (StrongHash, u64, u64),
    /// Candidates still matching every byte fed since the match began,
    /// kept in ascending `(source_blob_id, offset)` order so `live[0]` is
    /// always the deterministic tie-break winner.
    live: Vec<(StrongHash, u64)>,
}

/// Streams bytes in and produces a [`Recipe`] out.
///
/// Generic over its two collaborators — the piece handler that stores
/// original runs and the block source that answers candidate/lookup
/// questions — so both are monomorphized into the byte-scanning loop rather
/// than going through a `dyn` call on every byte.
///
/// `feed`, `close` and `get_recipe` must be called in that order by a single
/// caller; the finder is not reentrant.
pub struct RecipeFinder<H: PieceHandler, S: BlockSource> {
    block_size: usize,
    enable_dedup: bool,
    flush_threshold: usize,
    handler: H,
    source: S,
    rolling: RollingHash,
    full_hash: Option<StrongHashContext>,
    /// The not-yet-flushed tail of the current undecided run. Always holds
    /// at least the last `block_size - 1` bytes once dedup is enabled and
    /// the window has primed, since those bytes may still end up inside a
    /// future match window. Drained to empty the moment a match begins.
    buffer: Vec<u8>,
    /// Total bytes (flushed and buffered) belonging to the current
    /// undecided run, reset to 0 whenever a piece is finalized.
    run_len: u64,
    /// Index of the in-progress original piece once the handler has been
    /// told to start one via `init_piece`, so a later flush or finalize
    /// reuses it instead of starting a new one.
    open_run: Option<usize>,
    /// `Some` while a confirmed match is being extended; bytes fed while
    /// this is set go to [`step_extension`](Self::step_extension) instead
    /// of the normal buffer/rolling-hash scan.
    extend: Option<ExtendState>,
    pieces: Vec<Piece>,
    consumed: u64,
    closed: bool,
    md5sum: Option<StrongHash>,
}

impl<H: PieceHandler, S: BlockSource> RecipeFinder<H, S> {
    pub fn new(block_size: u32, enable_dedup: bool, handler: H, source: S) -> Self {
        let block_size = block_size as usize;
        RecipeFinder {
            block_size,
            enable_dedup,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            handler,
            source,
            rolling: RollingHash::new(block_size),
            full_hash: Some(StrongHashContext::new()),
            buffer: Vec::new(),
            run_len: 0,
            open_run: None,
            extend: None,
            pieces: Vec::new(),
            consumed: 0,
            closed: false,
            md5sum: None,
        }
    }

    /// Overrides the default mid-stream flush threshold, mainly so tests can
    /// force batching with small inputs.
    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Feeds more input bytes. May be called any number of times before
    /// [`close`](Self::close).
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), DedupError> {
        if self.closed {
            return Err(DedupError::bad_input_order("feed called after close"));
        }
        for &byte in bytes {
            self.consumed += 1;
            self.full_hash
                .as_mut()
                .expect("full_hash only taken at close")
                .update([byte]);
            self.dispatch_byte(byte)?;
        }
        self.maybe_flush()?;
        Ok(())
    }

    fn dispatch_byte(&mut self, byte: u8) -> Result<(), DedupError> {
        if self.extend.is_some() {
            self.step_extension(byte)
        } else {
            self.scan_byte(byte)
        }
    }

    /// Normal scanning: accumulate into the undecided buffer and the
    /// rolling hash, probing the candidate set and index once a full
    /// `block_size`-byte window is primed.
    fn scan_byte(&mut self, byte: u8) -> Result<(), DedupError> {
        self.buffer.push(byte);
        self.run_len += 1;

        if !self.enable_dedup {
            return Ok(());
        }

        self.rolling.feed(byte);
        let Some(rolling_hash) = self.rolling.current() else {
            return Ok(());
        };
        if !self.source.is_candidate(rolling_hash) {
            return Ok(());
        }

        let window_start = self.buffer.len() - self.block_size;
        let window = self.buffer[window_start..].to_vec();
        let strong_hash = StrongHash::digest(&window);

        let locations = self.source.locations(&strong_hash)?;
        if locations.is_empty() {
            // Candidate set hit but the index carries no strong-hash match
            // for this exact window. A bare hash set never produces this on
            // its own, but a future probabilistic candidate set could;
            // scanning simply continues.
            return Ok(());
        }

        let mut live = Vec::with_capacity(locations.len());
        for &(blob_id, offset) in &locations {
            match self.source.read_at(&blob_id, offset, self.block_size as u64) {
                Ok(actual) if actual == window => live.push((blob_id, offset)),
                Ok(_) => {
                    return Err(DedupError::index_inconsistency(
                        strong_hash,
                        "verification read disagreed with the matched window's bytes",
                    ));
                }
                Err(DedupError::StoreUnavailable(detail)) => {
                    tracing::warn!(
                        %strong_hash,
                        %detail,
                        "skipping candidate location: store unavailable for verification read"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        if live.is_empty() {
            return Ok(());
        }

        self.begin_match(live)
    }

    /// A block match has been confirmed against every location in `live`.
    /// Closes any open original run preceding the matched window, then
    /// switches to extension mode to find how far past `block_size` bytes
    /// the match actually goes.
    fn begin_match(&mut self, live: Vec<(StrongHash, u64)>) -> Result<(), DedupError> {
        let pre_match_len = self.buffer.len() - self.block_size;
        if self.run_len > self.block_size as u64 || self.open_run.is_some() {
            let idx = self.ensure_run_open()?;
            if pre_match_len > 0 {
                self.handler
                    .add_piece_data(idx, &self.buffer[..pre_match_len])?;
            }
            let (base_blob, base_offset) = self.handler.end_piece(idx)?;
            self.pieces.push(Piece::original(
                base_blob,
                base_offset,
                self.run_len - self.block_size as u64,
            ));
            self.open_run = None;
        }

        let (blob_id, offset) = live[0];
        self.extend = Some(ExtendState {
            best: (blob_id, offset, self.block_size as u64),
            live,
        });
        self.buffer.clear();
        self.run_len = 0;
        self.rolling.reset();
        Ok(())
    }

    /// One more byte arrives while a match is being extended: check it
    /// against every surviving candidate at the position right after what
    /// they've matched so far. Candidates that disagree (or whose blob ends
    /// here) drop out; once none are left, the match is finalized at its
    /// longest surviving length and this byte is re-scanned normally, since
    /// it belongs to whatever comes next, not to the match just closed.
    fn step_extension(&mut self, byte: u8) -> Result<(), DedupError> {
        let ext = self
            .extend
            .as_ref()
            .expect("step_extension only called while self.extend is Some");
        let matched_len = ext.best.2;

        let mut still_live = Vec::with_capacity(ext.live.len());
        for &(blob_id, start_offset) in &ext.live {
            match self.source.read_at(&blob_id, start_offset + matched_len, 1) {
                Ok(probe) if probe.first() == Some(&byte) => still_live.push((blob_id, start_offset)),
                Ok(_) => {}
                Err(DedupError::StoreUnavailable(_)) => {}
                Err(err) => return Err(err),
            }
        }

        if still_live.is_empty() {
            self.finalize_extension();
            self.scan_byte(byte)
        } else {
            let ext = self.extend.as_mut().expect("checked above");
            let new_len = matched_len + 1;
            ext.best = (still_live[0].0, still_live[0].1, new_len);
            ext.live = still_live;
            Ok(())
        }
    }

    /// Settles the in-progress match, emitting a referenced piece at its
    /// longest confirmed extension.
    fn finalize_extension(&mut self) {
        let ext = self
            .extend
            .take()
            .expect("finalize_extension only called while self.extend is Some");
        let (blob_id, offset, len) = ext.best;
        self.pieces.push(Piece::referenced(blob_id, offset, len));
    }

    fn ensure_run_open(&mut self) -> Result<usize, DedupError> {
        if let Some(idx) = self.open_run {
            return Ok(idx);
        }
        let idx = self.pieces.len();
        self.handler.init_piece(idx)?;
        self.open_run = Some(idx);
        Ok(idx)
    }

    fn maybe_flush(&mut self) -> Result<(), DedupError> {
        let retain = if self.enable_dedup {
            self.block_size.saturating_sub(1)
        } else {
            0
        };
        let stale = self.buffer.len().saturating_sub(retain);
        if stale > self.flush_threshold {
            let idx = self.ensure_run_open()?;
            let chunk: Vec<u8> = self.buffer.drain(..stale).collect();
            self.handler.add_piece_data(idx, &chunk)?;
        }
        Ok(())
    }

    /// Marks end of input. Any undecided bytes become a final original
    /// piece; a still-extending match is settled at whatever length it had
    /// reached.
    pub fn close(&mut self) -> Result<(), DedupError> {
        if self.closed {
            return Err(DedupError::bad_input_order("close called twice"));
        }
        if self.extend.is_some() {
            self.finalize_extension();
        }
        if self.run_len > 0 || self.open_run.is_some() {
            let idx = self.ensure_run_open()?;
            if !self.buffer.is_empty() {
                let tail = std::mem::take(&mut self.buffer);
                self.handler.add_piece_data(idx, &tail)?;
            }
            let (blob_id, base_offset) = self.handler.end_piece(idx)?;
            self.pieces.push(Piece::original(blob_id, base_offset, self.run_len));
            self.open_run = None;
            self.run_len = 0;
        }
        self.md5sum = Some(
            self.full_hash
                .take()
                .expect("full_hash only taken once, here")
                .finish(),
        );
        self.closed = true;
        Ok(())
    }

    /// Returns the finished recipe. Legal only after [`close`](Self::close).
    pub fn get_recipe(&self) -> Result<Recipe, DedupError> {
        if !self.closed {
            return Err(DedupError::bad_input_order("get_recipe called before close"));
        }
        let md5sum = self.md5sum.expect("set by close");
        Ok(Recipe::new(md5sum, self.consumed, self.pieces.clone()))
    }
}

//! Repository-wide configuration: the single recognized option plus the
//! block size that is fixed at repository creation.

use serde::{Deserialize, Serialize};

/// The default block size used by `RepositoryConfig::default` and the CLI
/// when no `--block-size` is given. Production repositories use a much
/// larger value; tests use `block_size: 3`.
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

/// Persisted, repository-wide configuration.
///
/// Loaded once at repository open time and never mutated afterwards: the
/// block size in particular must stay fixed for the lifetime of the index,
/// since every rolling hash and block location it stores was computed
/// against that exact B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// When `false`, every ingest produces a single original piece spanning
    /// the whole input and no index interaction happens at all.
    pub enable_deduplication: bool,
    /// The fixed-size block length `B`, in bytes. Immutable after creation.
    pub block_size: u32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        RepositoryConfig {
            enable_deduplication: true,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl RepositoryConfig {
    pub fn new(enable_deduplication: bool, block_size: u32) -> Self {
        RepositoryConfig {
            enable_deduplication,
            block_size,
        }
    }
}

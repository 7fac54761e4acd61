//! Command-line front end for the deduplication core, thin like
//! `harmonia-client`'s binary but with subcommands since it fronts several
//! distinct repository operations rather than one relay.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use dedup_core::{DEFAULT_BLOCK_SIZE, DedupError, Recipe, RepositoryConfig, StrongHash};
use dedup_repo::Repository;

#[derive(Parser, Debug)]
#[command(name = "dedup-cli", version, about = "Content-defined deduplication core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new repository at `repo-path`.
    Init {
        repo_path: PathBuf,
        /// Block size in bytes.
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: u32,
        /// Disable deduplication entirely: every ingest stores one original piece.
        #[arg(long)]
        no_dedup: bool,
    },
    /// Ingest a file, printing the resulting recipe as JSON.
    Ingest {
        repo_path: PathBuf,
        input_file: PathBuf,
    },
    /// Reconstruct a previously ingested stream from its saved recipe and
    /// write it to stdout.
    Cat {
        repo_path: PathBuf,
        md5sum: String,
    },
    /// Re-derive a reconstruction from its saved recipe and confirm its
    /// strong hash still matches.
    Verify {
        repo_path: PathBuf,
        md5sum: String,
    },
}

const RECIPES_DIR_NAME: &str = "recipes";

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Init {
            repo_path,
            block_size,
            no_dedup,
        } => init(&repo_path, block_size, no_dedup),
        Command::Ingest {
            repo_path,
            input_file,
        } => ingest(&repo_path, &input_file),
        Command::Cat { repo_path, md5sum } => cat(&repo_path, &md5sum),
        Command::Verify { repo_path, md5sum } => verify(&repo_path, &md5sum),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("dedup-cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init(repo_path: &PathBuf, block_size: u32, no_dedup: bool) -> Result<(), DedupError> {
    let config = RepositoryConfig::new(!no_dedup, block_size);
    let repo = Repository::create(repo_path, config)?;
    tracing::info!(
        path = %repo.root().display(),
        block_size,
        enable_deduplication = !no_dedup,
        "repository initialized"
    );
    Ok(())
}

fn ingest(repo_path: &PathBuf, input_file: &PathBuf) -> Result<(), DedupError> {
    let repo = Repository::open(repo_path)?;
    let file = fs::File::open(input_file)
        .map_err(|e| DedupError::io(format!("opening input file {}", input_file.display()), e))?;
    let recipe = repo.ingest_reader(file)?;
    save_recipe(repo_path, &recipe)?;
    println!("{}", serde_json::to_string_pretty(&recipe).expect("Recipe serializes"));
    Ok(())
}

fn cat(repo_path: &PathBuf, md5sum: &str) -> Result<(), DedupError> {
    let repo = Repository::open(repo_path)?;
    let recipe = load_recipe(repo_path, md5sum)?;
    let bytes = reconstruct(&repo, &recipe)?;
    std::io::stdout()
        .write_all(&bytes)
        .map_err(|e| DedupError::io("writing reconstructed bytes to stdout", e))
}

fn verify(repo_path: &PathBuf, md5sum: &str) -> Result<(), DedupError> {
    let repo = Repository::open(repo_path)?;
    let recipe = load_recipe(repo_path, md5sum)?;
    let bytes = reconstruct(&repo, &recipe)?;
    let actual = StrongHash::digest(&bytes);
    if actual != recipe.md5sum {
        return Err(DedupError::user_error(format!(
            "reconstruction mismatch: recipe claims {} but replaying its pieces hashes to {actual}",
            recipe.md5sum
        )));
    }
    println!("OK {actual}");
    Ok(())
}

fn reconstruct(repo: &Repository, recipe: &Recipe) -> Result<Vec<u8>, DedupError> {
    let mut out = Vec::with_capacity(recipe.size as usize);
    for piece in &recipe.pieces {
        let bytes = repo
            .blob_store()
            .read_at(&piece.source, piece.offset, piece.size)?;
        for _ in 0..piece.repeat {
            out.extend_from_slice(&bytes);
        }
    }
    Ok(out)
}

fn recipes_dir(repo_path: &PathBuf) -> PathBuf {
    repo_path.join(RECIPES_DIR_NAME)
}

fn recipe_path(repo_path: &PathBuf, md5sum: &str) -> PathBuf {
    recipes_dir(repo_path).join(format!("{md5sum}.recipe.json"))
}

fn save_recipe(repo_path: &PathBuf, recipe: &Recipe) -> Result<(), DedupError> {
    let dir = recipes_dir(repo_path);
    fs::create_dir_all(&dir)
        .map_err(|e| DedupError::io(format!("creating recipes directory {}", dir.display()), e))?;
    let path = recipe_path(repo_path, &recipe.md5sum.to_hex());
    let contents = serde_json::to_string_pretty(recipe).expect("Recipe serializes");
    fs::write(&path, contents)
        .map_err(|e| DedupError::io(format!("writing recipe {}", path.display()), e))
}

fn load_recipe(repo_path: &PathBuf, md5sum: &str) -> Result<Recipe, DedupError> {
    let path = recipe_path(repo_path, md5sum);
    let contents = fs::read_to_string(&path)
        .map_err(|e| DedupError::io(format!("reading recipe {}", path.display()), e))?;
    serde_json::from_str(&contents)
        .map_err(|e| DedupError::user_error(format!("invalid recipe {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_ingest_then_cat_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        init(&repo_path, 3, false).unwrap();

        let input_path = dir.path().join("input.txt");
        fs::write(&input_path, b"aaabbbccc").unwrap();
        ingest(&repo_path, &input_path).unwrap();

        let repo = Repository::open(&repo_path).unwrap();
        let md5sum = StrongHash::digest(b"aaabbbccc").to_hex();
        let recipe = load_recipe(&repo_path, &md5sum).unwrap();
        let bytes = reconstruct(&repo, &recipe).unwrap();
        assert_eq!(bytes, b"aaabbbccc");
    }

    #[test]
    fn verify_rejects_an_unknown_md5sum() {
        let dir = tempfile::tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        init(&repo_path, 3, false).unwrap();
        let err = verify(&repo_path, "0000000000000000000000000000000").unwrap_err();
        assert!(matches!(err, DedupError::Io { .. }));
    }

    #[test]
    fn no_dedup_flag_disables_matching() {
        let dir = tempfile::tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        init(&repo_path, 3, true).unwrap();
        let repo = Repository::open(&repo_path).unwrap();
        assert!(!repo.config().enable_deduplication);
    }
}

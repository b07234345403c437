use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use lexsem_core::persist::{load_meta, load_snapshot, save_snapshot, IndexPaths};
use lexsem_core::{DirectorySource, Engine, IndexManager, SearchConfig, SearchMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect hybrid lexical + semantic indexes", long_about = None)]
struct Cli {
    /// Optional JSON search config (language, embedding dimension, limits, weights)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from JSON/JSONL/text files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Add to the existing index in `output` instead of starting fresh
        #[arg(long, default_value_t = false)]
        append: bool,
    },
    /// Print the metadata of an existing index
    Stats {
        #[arg(long)]
        index: PathBuf,
    },
    /// Run one query against an existing index
    Query {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        q: String,
        #[arg(long, default_value = "hybrid")]
        mode: SearchMode,
        #[arg(long)]
        k: Option<usize>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = SearchConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Build { input, output, append } => build_index(&input, &output, append, config),
        Commands::Stats { index } => {
            let meta = load_meta(&IndexPaths::new(&index))?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }
        Commands::Query { index, q, mode, k } => {
            let engine = open_engine(&index, config)?;
            let hits = engine.search(&q, mode, k, None)?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
            Ok(())
        }
    }
}

/// Restores the snapshot under `index` and checks it against the configured embedder.
fn open_engine(index: &Path, config: SearchConfig) -> Result<Engine> {
    let manager = IndexManager::from_snapshot(load_snapshot(&IndexPaths::new(index))?)?;
    if let Some(dim) = manager.dimension() {
        if dim != config.embedding_dimension {
            bail!("index has embedding dimension {dim} but the embedder produces {}", config.embedding_dimension);
        }
    }
    Ok(Engine::with_manager(Arc::new(manager), config))
}

fn build_index(input: &Path, output: &Path, append: bool, config: SearchConfig) -> Result<()> {
    let out_paths = IndexPaths::new(output);
    let engine = if append && out_paths.exists() {
        open_engine(output, config)?
    } else {
        Engine::from_config(config)
    };
    let before = engine.manager().len();

    let report = engine.index_source(DirectorySource::open(input));
    for failure in &report.failed {
        tracing::warn!(path = %failure.path, reason = %failure.reason, "skipped document");
    }
    tracing::info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        previous = before,
        "ingested documents"
    );

    let meta = save_snapshot(&out_paths, &engine.manager().snapshot())?;
    tracing::info!(
        output = %output.display(),
        num_docs = meta.num_docs,
        num_terms = meta.num_terms,
        "index build complete"
    );
    Ok(())
}

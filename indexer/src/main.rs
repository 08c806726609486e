use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use engine::{
    Config, FsSource, IdfMode, IndexBuilder, IndexStore, InvertedFile, Language, Progress, Repository,
    Searcher, Snapshot, SortOrder, TokenizerKind,
};
use tracing_subscriber::{fmt, EnvFilter};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, update and query local full-text indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Directory holding snapshots
    #[arg(long, default_value = "./index")]
    store: PathBuf,
    /// Index identifier
    #[arg(long, default_value = "default")]
    id: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every accepted file under a directory and write a fresh snapshot
    Build {
        /// Directory to index
        #[arg(long)]
        root: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
        /// TOML configuration; command-line options override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        language: Option<Language>,
        #[arg(long)]
        tokenizer: Option<TokenizerKind>,
        /// Use log10(N/df) instead of the smoothed log10(1 + N/df)
        #[arg(long, default_value_t = false)]
        plain_idf: bool,
    },
    /// Drop vanished files and index new ones into an existing snapshot
    Update {
        #[arg(long)]
        root: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Run a query against a snapshot
    Search {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long, short)]
        query: String,
        #[arg(long, default_value = "relevance")]
        sort: SortOrder,
        #[arg(long, short = 'k')]
        limit: Option<usize>,
    },
    /// Print snapshot statistics as JSON
    Stats {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Write a default configuration file
    InitConfig {
        #[arg(long, default_value = "search.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { root, store, config, language, tokenizer, plain_idf } => {
            let mut cfg = match config {
                Some(path) => Config::load(&path)?,
                None => Config::default(),
            };
            cfg = cfg.with_identifier(store.id);
            if let Some(language) = language {
                cfg = cfg.with_language(language);
            }
            if let Some(tokenizer) = tokenizer {
                cfg = cfg.with_tokenizer(tokenizer);
            }
            if plain_idf {
                cfg = cfg.with_idf(IdfMode::Plain);
            }
            build_index(&root, &IndexStore::new(&store.store), cfg)
        }
        Commands::Update { root, store } => update_index(&root, &IndexStore::new(&store.store), &store.id),
        Commands::Search { store, query, sort, limit } => {
            search_index(&IndexStore::new(&store.store), &store.id, &query, sort, limit)
        }
        Commands::Stats { store } => print_stats(&IndexStore::new(&store.store), &store.id),
        Commands::InitConfig { output } => {
            if output.exists() {
                bail!("{} already exists", output.display());
            }
            Config::default().save(&output)?;
            tracing::info!(path = %output.display(), "wrote default configuration");
            Ok(())
        }
    }
}

fn log_progress(p: Progress) {
    if p.done == p.total || p.done % 100 == 0 {
        tracing::info!(done = p.done, total = p.total, "indexing");
    }
}

fn build_index(root: &Path, store: &IndexStore, config: Config) -> Result<()> {
    config.validate()?;
    let source = FsSource::new(root, &config);
    let mut repo = Repository::new(source, config.clone());
    let index = InvertedFile::new();
    let report = IndexBuilder::new(&config)
        .with_store(store)
        .with_progress(&log_progress)
        .add_repository(&mut repo, &index)
        .with_context(|| format!("indexing {}", root.display()))?;

    let (_, corpus, config) = repo.into_parts();
    let meta = store.save(&Snapshot::new(config, corpus, index))?;
    tracing::info!(
        indexed = report.indexed,
        skipped = report.skipped,
        num_terms = meta.num_terms,
        store = %store.root().display(),
        "index build complete"
    );
    Ok(())
}

fn update_index(root: &Path, store: &IndexStore, id: &str) -> Result<()> {
    let Snapshot { config, corpus, index } = store.load(id)?;
    let source = FsSource::new(root, &config);
    let mut repo = Repository::with_corpus(source, config.clone(), corpus);
    let report = IndexBuilder::new(&config)
        .with_store(store)
        .with_progress(&log_progress)
        .update(&mut repo, &index)?;

    let (_, corpus, config) = repo.into_parts();
    store.save(&Snapshot::new(config, corpus, index))?;
    tracing::info!(indexed = report.indexed, removed = report.removed, skipped = report.skipped, "update complete");
    Ok(())
}

fn search_index(store: &IndexStore, id: &str, query: &str, sort: SortOrder, limit: Option<usize>) -> Result<()> {
    let snapshot = store.load(id)?;
    let analyzer = snapshot.config.analyzer();
    let searcher = Searcher::new(&snapshot.index, &snapshot.corpus, &analyzer).with_idf(snapshot.config.idf);
    let results = searcher.search(query, sort, limit)?;
    for hit in &results {
        println!("{:>10.4}  {}", hit.score, hit.path);
    }
    tracing::info!(hits = results.len(), "search finished");
    Ok(())
}

fn print_stats(store: &IndexStore, id: &str) -> Result<()> {
    let snapshot = store.load(id)?;
    let stats = snapshot.index.stats();
    let out = serde_json::json!({
        "identifier": snapshot.config.identifier,
        "documents": snapshot.corpus.len(),
        "terms": stats.terms,
        "postings": stats.postings,
        "positions": stats.positions,
        "meta": store.load_meta(id).ok(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use retrieval::persist::{load_index, open_for_build, save_index, IndexPaths};
use retrieval::run::search_run;
use retrieval::{Analyzer, BuildMode, CorpusParser, Document, Error, InvertedIndex, SearchConfig};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a fielded index over a tagged corpus and produce TREC runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the corpus and create or update the index
    Build(BuildArgs),
    /// Evaluate a query file against an existing index
    Search(SearchArgs),
    /// Build, then search, in one go
    Run {
        #[command(flatten)]
        build: BuildArgs,
        #[command(flatten)]
        search: SearchOpts,
    },
}

#[derive(Args)]
struct BuildArgs {
    /// Index directory
    #[arg(long, default_value = "index")]
    index: PathBuf,
    /// Corpus file or directory of corpus files
    #[arg(long)]
    docs: PathBuf,
    /// Upsert into the existing index instead of recreating it
    #[arg(long, default_value_t = false)]
    update: bool,
    /// Drop English stopwords while analyzing
    #[arg(long, default_value_t = false)]
    stopwords: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Index directory
    #[arg(long, default_value = "index")]
    index: PathBuf,
    #[command(flatten)]
    opts: SearchOpts,
}

#[derive(Args)]
struct SearchOpts {
    /// Query file
    #[arg(long)]
    queries: PathBuf,
    /// Run file, or a directory that receives outputs.txt
    #[arg(long, default_value = "outputs.txt")]
    output: PathBuf,
    /// 0 classic, 1 BM25, 2 boolean, 3 LM Dirichlet, 4 LM Jelinek-Mercer
    #[arg(long)]
    similarity: Option<u32>,
    #[arg(long)]
    hits_per_page: Option<usize>,
    /// JSON file with search settings; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => {
            let files = corpus_files(&args.docs)?;
            build_index(&args, Analyzer::new(args.stopwords), files)?;
            Ok(())
        }
        Commands::Search(args) => {
            let config = search_config(&args.opts)?;
            readable(&args.opts.queries)?;
            let index = load_index(&IndexPaths::new(&args.index))
                .with_context(|| format!("loading index from {}", args.index.display()))?;
            config.analyzer_for(*index.analyzer())?;
            search(&index, &config, &args.opts)
        }
        Commands::Run { build, search: opts } => {
            // Settings and inputs are checked before the corpus is touched.
            let config = search_config(&opts)?;
            let analyzer = build_analyzer(&build, &config)?;
            let files = corpus_files(&build.docs)?;
            readable(&opts.queries)?;
            let index = build_index(&build, analyzer, files)?;
            search(&index, &config, &opts)
        }
    }
}

fn search_config(opts: &SearchOpts) -> Result<SearchConfig> {
    let mut config = match &opts.config {
        Some(path) => SearchConfig::from_json_file(path)?,
        None => SearchConfig::default(),
    };
    if let Some(s) = opts.similarity {
        config.similarity = s;
    }
    if let Some(n) = opts.hits_per_page {
        config.hits_per_page = n;
    }
    config.validate()?;
    Ok(config)
}

/// `--stopwords` and a config file that says `"stopwords": false` contradict each other.
fn build_analyzer(args: &BuildArgs, config: &SearchConfig) -> Result<Analyzer, Error> {
    match (args.stopwords, config.stopwords) {
        (true, Some(false)) => Err(Error::config("--stopwords conflicts with stopwords = false in the config file")),
        (flag, file) => Ok(Analyzer::new(flag || file == Some(true))),
    }
}

fn readable(path: &Path) -> Result<(), Error> {
    File::open(path)
        .map(drop)
        .map_err(|e| Error::config(format!("{} is not readable: {e}", path.display())))
}

/// Corpus files under `input`, in path order.
fn corpus_files(input: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            let hidden = p.file_name().and_then(|s| s.to_str()).map_or(false, |n| n.starts_with('.'));
            if p.is_file() && !hidden {
                files.push(p.to_path_buf());
            }
        }
    } else {
        readable(input)?;
        files.push(input.to_path_buf());
    }
    if files.is_empty() {
        return Err(Error::config(format!("no corpus files found under {}", input.display())));
    }
    Ok(files)
}

fn documents(files: Vec<PathBuf>) -> impl Iterator<Item = retrieval::Result<Document>> {
    files.into_iter().flat_map(|file| {
        tracing::info!(file = %file.display(), "reading corpus file");
        let parsed: Box<dyn Iterator<Item = retrieval::Result<Document>>> = match File::open(&file) {
            Ok(f) => Box::new(CorpusParser::new(BufReader::new(f))),
            Err(e) => Box::new(std::iter::once(Err(Error::Io(e)))),
        };
        parsed
    })
}

fn build_index(args: &BuildArgs, analyzer: Analyzer, files: Vec<PathBuf>) -> Result<InvertedIndex> {
    let mode = if args.update { BuildMode::Update } else { BuildMode::Create };
    let paths = IndexPaths::new(&args.index);
    let mut index = open_for_build(&paths, mode, analyzer)?;
    tracing::info!(index = %args.index.display(), ?mode, "indexing");
    let report = index.build(documents(files), mode)?;
    save_index(&paths, &index).with_context(|| format!("writing index to {}", args.index.display()))?;
    tracing::info!(added = report.added, replaced = report.replaced, "index build complete");
    Ok(index)
}

fn search(index: &InvertedIndex, config: &SearchConfig, opts: &SearchOpts) -> Result<()> {
    let queries = File::open(&opts.queries)
        .map_err(|e| Error::config(format!("{} is not readable: {e}", opts.queries.display())))?;
    let output = if opts.output.is_dir() { opts.output.join("outputs.txt") } else { opts.output.clone() };
    let out = BufWriter::new(
        File::create(&output).with_context(|| format!("creating run file {}", output.display()))?,
    );
    let report = search_run(index, config, BufReader::new(queries), out)?;
    tracing::info!(
        queries = report.queries,
        skipped = report.skipped,
        empty = report.empty,
        lines = report.lines,
        output = %output.display(),
        "search complete"
    );
    Ok(())
}

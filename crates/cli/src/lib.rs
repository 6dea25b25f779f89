use anyhow::{bail, Context as AnyhowContext, Result};
use autocomplete_index::{
    parse_query_string, tokenize, BuildState, GraphSource, LabelConfig, MemoryGraph,
    RankProvider, Session, StaticRanks, Suggestion, Token, Weighting, DEFAULT_RESULT_COUNT,
};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod triples;

pub use config::CliConfig;
pub use triples::{parse as parse_triples, parse_file as parse_triples_file, Triple};

#[derive(Parser)]
#[command(name = "autocomplete")]
#[command(about = "Autocomplete over graph identifiers and labels", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for results)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load triples, build the index and run queries against it
    Query(QueryArgs),

    /// Show how text is split into tokens
    Tokenize(TokenizeArgs),
}

#[derive(Args)]
struct QueryArgs {
    /// Triples file, one `<s> <p> <o> .` per line
    #[arg(long)]
    data: PathBuf,

    /// TOML config with `index_iris`, `labels` and `ranks`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep settings and the built index here between runs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Label predicate as `iri@lang,lang`; repeatable
    #[arg(long = "label")]
    labels: Vec<String>,

    /// Do not index entity identifiers
    #[arg(long)]
    no_iris: bool,

    /// Maximum suggestions per query
    #[arg(long, short = 'n', default_value_t = DEFAULT_RESULT_COUNT)]
    limit: usize,

    /// Seconds to wait for the index build
    #[arg(long, default_value_t = 300)]
    build_timeout: u64,

    /// Print JSON instead of `iri; display` lines
    #[arg(long)]
    json: bool,

    /// Queries in `namespace;text` or `text` form
    #[arg(required = true)]
    queries: Vec<String>,
}

#[derive(Args)]
struct TokenizeArgs {
    #[arg(required = true)]
    texts: Vec<String>,
}

#[derive(Serialize)]
struct QueryReport<'a> {
    status: String,
    results: Vec<QueryResult<'a>>,
}

#[derive(Serialize)]
struct QueryResult<'a> {
    query: &'a str,
    suggestions: Vec<Suggestion>,
}

#[derive(Serialize)]
struct TokenizeResult<'a> {
    text: &'a str,
    tokens: Vec<Token>,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Query(args) => run_query(args).await,
        Commands::Tokenize(args) => run_tokenize(&args),
    }
}

fn run_tokenize(args: &TokenizeArgs) -> Result<()> {
    let results: Vec<TokenizeResult<'_>> = args
        .texts
        .iter()
        .map(|text| TokenizeResult {
            text,
            tokens: tokenize(text),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

async fn run_query(args: QueryArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    let labels = config.label_configs(&args.labels)?;

    let graph = Arc::new(MemoryGraph::new());
    for (subject, predicate, object) in triples::parse_file(&args.data)? {
        graph.load(subject, predicate, object);
    }
    info!(
        "Loaded {} statements over {} entities",
        graph.statement_count(),
        graph.entity_count()
    );

    let weighting = rank_weighting(&graph, &config);
    let session = Session::open(args.data_dir.as_deref(), graph, weighting)
        .context("Failed to open the autocomplete index")?;

    let index_iris = if args.no_iris {
        false
    } else {
        config.index_iris.unwrap_or(true)
    };
    session.set_index_iris(index_iris);
    if !labels.is_empty() {
        replace_labels(&session, labels);
    }

    let build = match session.set_enabled(true)? {
        Some(build) => Some(build),
        None if session.status().state != BuildState::Ready => session.build_index()?,
        None => None,
    };
    if let Some(build) = build {
        let outcome = tokio::time::timeout(Duration::from_secs(args.build_timeout), build.join())
            .await
            .context("Timed out waiting for the index build")?;
        if !outcome.is_committed() {
            bail!("Index was not built: {}", session.status());
        }
    }

    let mut results = Vec::with_capacity(args.queries.len());
    for query in &args.queries {
        let (namespace, text) = parse_query_string(query);
        let suggestions = session
            .query(namespace, text, args.limit)
            .with_context(|| format!("Query {query:?} failed"))?;
        results.push(QueryResult { query, suggestions });
    }
    let report = QueryReport {
        status: session.status_string(),
        results,
    };
    session.shutdown();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for result in &report.results {
        println!("# {}", result.query);
        for suggestion in &result.suggestions {
            println!("{}; {}", suggestion.iri, suggestion.display);
        }
    }
    Ok(())
}

fn rank_weighting(graph: &MemoryGraph, config: &CliConfig) -> Weighting {
    if config.ranks.is_empty() {
        return Weighting::unranked();
    }
    let mut ranks = StaticRanks::new();
    for (iri, rank) in &config.ranks {
        match graph.resolve(iri) {
            Some(id) => ranks.set(id, *rank),
            None => warn!("Ranked entity {iri} is not in the data"),
        }
    }
    let provider: Arc<dyn RankProvider> = Arc::new(ranks);
    Weighting::with_provider(Some(provider))
}

fn replace_labels(session: &Session, labels: Vec<LabelConfig>) {
    for existing in session.label_configs() {
        if !labels.contains(&existing) {
            session.remove_label_config(existing.predicate.as_str());
        }
    }
    for label in labels {
        session.add_label_config(label);
    }
}

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use docsift_chunker::Chunker;
use docsift_core::{DocsiftConfig, Framework, OutputFormat, RetrievalResult};
use docsift_ingest::{IngestReport, IngestionPipeline};
use docsift_search::{ChunkIndex, DenseRetriever, EmbeddingClient, HybridSearch, SearchOptions};

#[derive(Parser)]
#[command(
    name = "docsift",
    version,
    about = "Structure-aware documentation retrieval",
    long_about = "docsift chunks technical documentation along its structure, links the\n\
                   chunks into a hierarchy, and answers questions with hybrid dense + keyword\n\
                   search fused by Reciprocal Rank Fusion under a token budget.\n\n\
                   Examples:\n  \
                     docsift init                          Create a .docsift.toml config file\n  \
                     docsift index ./docs                  Build the local index\n  \
                     docsift search 'sort a grid'          Ask a question\n  \
                     docsift search 'binder' --framework flow --max-tokens 800\n  \
                     docsift chunk docs/components/grid.md Show how a file is chunked"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .docsift.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, link and embed a documentation tree into the local index
    #[command(long_about = "Chunk, link and embed a documentation tree into the local index.\n\n\
        Walks the directory (honouring .gitignore), chunks every Markdown and AsciiDoc\n\
        file, links the chunks into a hierarchy, and writes them with their embeddings.\n\
        Files already in the index are replaced. Requires an embedding API key.\n\n\
        Examples:\n  docsift index ./docs\n  docsift index ./docs --rebuild --doc-version 24.4")]
    Index {
        /// Documentation root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Delete the existing index before indexing
        #[arg(long)]
        rebuild: bool,

        /// Product version to stamp on every indexed document
        #[arg(long)]
        doc_version: Option<String>,
    },
    /// Search the index with a natural-language question
    #[command(long_about = "Search the index with a natural-language question.\n\n\
        Runs the dense and keyword channels concurrently, fuses their rankings, and\n\
        trims the result list to the token budget. Common content is always included\n\
        alongside the selected framework.\n\n\
        Examples:\n  docsift search 'how do I sort a grid'\n  docsift search 'binder validation' --framework flow --max-results 3")]
    Search {
        /// The question
        query: String,

        /// Maximum results (default: [search].default_max_results)
        #[arg(long)]
        max_results: Option<usize>,

        /// Token budget for all returned content (default: [search].default_max_tokens)
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Restrict to a framework: flow, hilla or common
        #[arg(long)]
        framework: Option<Framework>,

        /// Restrict to an exact product version
        #[arg(long)]
        doc_version: Option<String>,
    },
    /// Show how a single file is chunked, without touching the index
    Chunk {
        /// Documentation file
        file: PathBuf,

        /// Root the file path is made relative to
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Fetch a chunk by id, optionally with its children
    Get {
        /// Chunk id
        chunk_id: String,

        /// Also list the chunks nested under it
        #[arg(long)]
        children: bool,
    },
    /// Fetch full documents by file path
    Docs {
        /// File paths as stored in the index
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Show index statistics
    Stats,
    /// Create a default .docsift.toml configuration file
    #[command(long_about = "Create a default .docsift.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .docsift.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# docsift configuration
# All values shown are defaults. Uncomment to override.

# [chunker]
# max_chunk_size = 800
# chunk_overlap = 50
# min_context_chars = 20
# max_context_chars = 300

# [search]
# rrf_k = 60
# overfetch_factor = 4
# min_overfetch = 20
# chars_per_token = 4
# channel_timeout_ms = 10000
# default_max_results = 5
# default_max_tokens = 1500

# [embedding]
# api_key = ""              # or set DOCSIFT_EMBEDDING_API_KEY
# base_url = "https://api.openai.com/v1"
# model = "text-embedding-3-small"
# dimensions = 1536

# [ingest]
# batch_size = 64
# batch_delay_ms = 200
# max_retries = 3
# base_backoff_ms = 1000
# max_backoff_ms = 30000
# source_base_url = "https://vaadin.com/docs/latest"

# [index]
# path = ".docsift/index.db"
"#;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DocsiftConfig> {
    match path {
        Some(path) => DocsiftConfig::from_file(path)
            .into_diagnostic()
            .wrap_err(format!("loading {}", path.display())),
        None => {
            let default_path = Path::new(".docsift.toml");
            if default_path.exists() {
                DocsiftConfig::from_file(default_path)
                    .into_diagnostic()
                    .wrap_err("loading .docsift.toml")
            } else {
                Ok(DocsiftConfig::default())
            }
        }
    }
}

fn embedding_client(config: &DocsiftConfig) -> Result<EmbeddingClient> {
    EmbeddingClient::with_config(&config.embedding)
        .into_diagnostic()
        .wrap_err(format!(
            "set {} or add api_key under [embedding] in .docsift.toml",
            docsift_search::embedding::API_KEY_ENV
        ))
}

fn open_existing_index(config: &DocsiftConfig) -> Result<Arc<ChunkIndex>> {
    let path = &config.index.path;
    if !path.exists() {
        miette::bail!(miette::miette!(
            help = "Run `docsift index <docs-dir>` first",
            "No index at {}",
            path.display()
        ));
    }
    let index = ChunkIndex::open(path)
        .into_diagnostic()
        .wrap_err(format!("opening {}", path.display()))?;
    Ok(Arc::new(index))
}

/// Engine for id and path lookups; these never reach the retrieval channels.
fn lookup_engine(index: Arc<ChunkIndex>, config: &DocsiftConfig) -> HybridSearch {
    HybridSearch::new(index.clone(), index.clone(), index, config.search.clone())
}

fn spinner(message: &'static str) -> Result<Option<indicatif::ProgressBar>> {
    if !std::io::stderr().is_terminal() {
        return Ok(None);
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .into_diagnostic()?,
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Ok(Some(pb))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn print_report(report: &IngestReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Markdown => {
            println!("# Index report\n");
            println!(
                "| Documents | Chunks | Batches written | Failed batches | Failed files | Removed files |"
            );
            println!("|---|---|---|---|---|---|");
            println!(
                "| {} | {} | {} | {} | {} | {} |",
                report.documents,
                report.chunks,
                report.batches_written,
                report.failed_batches.len(),
                report.failed_files.len(),
                report.removed_files.len()
            );
        }
        OutputFormat::Text => {
            println!(
                "Indexed {} documents: {} chunks in {} batches",
                report.documents, report.chunks, report.batches_written
            );
            for failure in &report.failed_batches {
                println!(
                    "  batch {} failed ({} chunks): {}",
                    failure.batch,
                    failure.chunk_ids.len(),
                    failure.error
                );
            }
            for file in &report.removed_files {
                println!("  {file} removed");
            }
            for (file, error) in &report.failed_files {
                println!("  {file} skipped: {error}");
            }
        }
    }
    Ok(())
}

fn print_results(results: &[RetrievalResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(results)?,
        OutputFormat::Markdown => {
            if results.is_empty() {
                println!("No results found.");
                return Ok(());
            }
            println!("# Search Results\n");
            for (i, r) in results.iter().enumerate() {
                println!(
                    "## {}. {} (score: {:.4})\n\n<{}> · `{}` · {}\n\n{}\n",
                    i + 1,
                    r.chunk.heading(),
                    r.relevance_score,
                    r.chunk.source_url,
                    r.file_path,
                    r.chunk.framework,
                    r.chunk.content
                );
            }
        }
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No results found.");
                return Ok(());
            }
            for (i, r) in results.iter().enumerate() {
                println!(
                    "{}. {} [{}] (score: {:.4})",
                    i + 1,
                    r.file_path,
                    r.chunk.framework,
                    r.relevance_score
                );
                println!("   {}  {}", r.chunk.heading(), r.chunk.source_url);
                println!("   id: {}", r.chunk.chunk_id);
            }
        }
    }
    Ok(())
}

fn print_chunks(chunks: &[docsift_core::Chunk], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(chunks)?,
        OutputFormat::Markdown => {
            for chunk in chunks {
                println!(
                    "### {} `{}`\n\n- parent: `{}`\n- type: {}\n\n{}\n",
                    chunk.heading(),
                    chunk.chunk_id,
                    chunk.parent_id.as_deref().unwrap_or("-"),
                    chunk.metadata.chunk_type,
                    chunk.content
                );
            }
        }
        OutputFormat::Text => {
            for chunk in chunks {
                println!(
                    "{} {:<12} parent={} level={} chars={}  {}",
                    chunk.chunk_id,
                    chunk.metadata.chunk_type.as_str(),
                    chunk.parent_id.as_deref().unwrap_or("-"),
                    chunk.metadata.level,
                    chunk.content.chars().count(),
                    chunk.heading()
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(
        index = %config.index.path.display(),
        format = %cli.format,
        "configuration loaded"
    );

    match cli.command {
        None => {
            Cli::command().print_help().into_diagnostic()?;
        }
        Some(Command::Index {
            ref path,
            rebuild,
            ref doc_version,
        }) => {
            let embedder = Arc::new(embedding_client(&config)?);
            let index_path = &config.index.path;
            if rebuild && index_path.exists() {
                std::fs::remove_file(index_path)
                    .into_diagnostic()
                    .wrap_err(format!("removing {}", index_path.display()))?;
            }
            let index = Arc::new(
                ChunkIndex::open(index_path)
                    .into_diagnostic()
                    .wrap_err(format!("opening {}", index_path.display()))?,
            );
            index
                .set_dimensions(config.embedding.dimensions)
                .into_diagnostic()?;

            let mut documents =
                docsift_ingest::discover_documents(path, &config.ingest.source_base_url)
                    .into_diagnostic()
                    .wrap_err(format!("reading {}", path.display()))?;
            if documents.is_empty() {
                miette::bail!("No documentation files found under {}", path.display());
            }
            if let Some(version) = doc_version {
                for doc in &mut documents {
                    doc.meta.version = Some(version.clone());
                }
            }

            let pipeline = IngestionPipeline::new(
                config.chunker.clone(),
                config.ingest.clone(),
                embedder,
                index.clone(),
            );
            let pb = spinner("Indexing documentation...")?;
            let report = pipeline.ingest(documents).await.inspect_err(|_| {
                if let Some(pb) = &pb {
                    pb.finish_with_message("Failed");
                }
            });
            let report = report.into_diagnostic()?;
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }

            print_report(&report, cli.format)?;
            if !report.is_complete() {
                miette::bail!(
                    "{} batches and {} files were not indexed",
                    report.failed_batches.len(),
                    report.failed_files.len()
                );
            }
        }
        Some(Command::Search {
            ref query,
            max_results,
            max_tokens,
            framework,
            ref doc_version,
        }) => {
            let index = open_existing_index(&config)?;
            let embedder = Arc::new(embedding_client(&config)?);
            let dense = Arc::new(DenseRetriever::new(embedder, index.clone()));
            let engine = HybridSearch::new(dense, index.clone(), index, config.search.clone());

            let defaults = SearchOptions::from_config(&config.search);
            let options = SearchOptions {
                max_results: max_results.unwrap_or(defaults.max_results),
                max_tokens: max_tokens.unwrap_or(defaults.max_tokens),
                framework,
                version: doc_version.clone(),
            };
            let results = engine.search(query, &options).await;
            print_results(&results, cli.format)?;
        }
        Some(Command::Chunk { ref file, ref root }) => {
            let document =
                docsift_ingest::read_document(root, file, &config.ingest.source_base_url)
                    .into_diagnostic()
                    .wrap_err(format!("reading {}", file.display()))?;
            let chunks = Chunker::new(config.chunker.clone()).chunk(&document);
            print_chunks(&chunks, cli.format)?;
        }
        Some(Command::Get {
            ref chunk_id,
            children,
        }) => {
            let index = open_existing_index(&config)?;
            let engine = lookup_engine(index.clone(), &config);
            let Some(chunk) = engine.get_chunk(chunk_id).await.into_diagnostic()? else {
                miette::bail!("No chunk with id {chunk_id}");
            };
            let mut chunks = vec![chunk];
            if children {
                chunks.extend(index.children(chunk_id).into_diagnostic()?);
            }
            print_chunks(&chunks, cli.format)?;
        }
        Some(Command::Docs { ref paths }) => {
            let index = open_existing_index(&config)?;
            let engine = lookup_engine(index, &config);
            let docs = engine.get_documents(paths).await;
            match cli.format {
                OutputFormat::Json => print_json(&docs)?,
                OutputFormat::Markdown | OutputFormat::Text => {
                    for doc in &docs {
                        match &doc.error {
                            Some(error) => eprintln!("{}: {error}", doc.file_path),
                            None => println!("{}", doc.content),
                        }
                    }
                }
            }
        }
        Some(Command::Stats) => {
            let index = open_existing_index(&config)?;
            let stats = index.stats().into_diagnostic()?;
            match cli.format {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Markdown | OutputFormat::Text => {
                    println!("Chunks:    {} ({} embedded)", stats.total_chunks, stats.embedded_chunks);
                    println!("Documents: {}", stats.total_documents);
                    println!("Size:      {} bytes", stats.index_size_bytes);
                    if let Some(at) = &stats.last_indexed_at {
                        println!("Indexed:   {at}");
                    }
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(".docsift.toml");
            if path.exists() {
                miette::bail!(".docsift.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .docsift.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "docsift", &mut std::io::stdout());
        }
    }

    Ok(())
}

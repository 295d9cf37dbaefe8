//! Rust RAG Indexer CLI
//!
//! Builds, inspects and queries chunked vector indexes over text documents.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_rag_indexer::{
    chunker::{Chunk, reconstruct},
    config::Config,
    document::Document,
    embedding,
    index::VectorIndex,
    llm::LlmClient,
    persistence::{DEFAULT_INDEX_PATH, index_exists, index_size, load_index, save_index},
    retriever::{Retriever, format_context},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Rust RAG Indexer - chunked semantic retrieval over text documents
#[derive(Parser)]
#[command(name = "rag-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read configuration from this YAML file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log progress (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index a document
    Index {
        /// Path to the document file (text file)
        document: PathBuf,

        /// Output path for the index file (.json, .bin or .bincode)
        #[arg(short, long, default_value = DEFAULT_INDEX_PATH)]
        output: PathBuf,

        /// Override the configured chunk size
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override the configured chunk overlap
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },

    /// Retrieve the chunks most similar to a question
    Query {
        /// The question
        question: String,

        /// Path to the index file
        #[arg(short, long, default_value = DEFAULT_INDEX_PATH)]
        index: PathBuf,

        /// Number of results to return (defaults to the configured top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the prompt context block instead of a result list
        #[arg(long)]
        context: bool,
    },

    /// List the chunks stored in an index
    Show {
        /// Path to the index file
        #[arg(default_value = DEFAULT_INDEX_PATH)]
        index: PathBuf,

        /// Output chunks as JSON
        #[arg(long)]
        json: bool,

        /// Print the document text rebuilt from the chunks
        #[arg(long, conflicts_with = "json")]
        text: bool,
    },

    /// Show information about an index
    Info {
        /// Path to the index file
        #[arg(default_value = DEFAULT_INDEX_PATH)]
        index: PathBuf,
    },

    /// Test the embedding provider and LLM connection
    Test,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Config::load().context("Failed to load configuration"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Index {
            document,
            output,
            chunk_size,
            chunk_overlap,
        } => cmd_index(config, document, output, chunk_size, chunk_overlap).await,
        Commands::Query {
            question,
            index,
            top_k,
            context,
        } => cmd_query(config, question, index, top_k, context).await,
        Commands::Show { index, json, text } => cmd_show(index, json, text),
        Commands::Info { index } => cmd_info(index),
        Commands::Test => cmd_test(config).await,
    }
}

fn ensure_index(index_path: &Path) -> Result<()> {
    if !index_exists(index_path) {
        anyhow::bail!(
            "Index not found at '{}'. Run 'index' command first.",
            index_path.display()
        );
    }
    Ok(())
}

async fn cmd_index(
    mut config: Config,
    document_path: PathBuf,
    output: PathBuf,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
) -> Result<()> {
    if let Some(size) = chunk_size {
        config.chunking.chunk_size = size;
    }
    if let Some(overlap) = chunk_overlap {
        config.chunking.chunk_overlap = overlap;
    }
    config.validate().context("Invalid configuration")?;

    let embedder = embedding::from_config(&config.embedding, config.retry)
        .context("Failed to create embedder")?;

    println!("Indexing document: {}", document_path.display());
    println!("Using embedder: {}", embedder.model_id());

    let start = Instant::now();

    let document = Document::from_text_file(&document_path).context("Failed to load document")?;
    let chunks = document
        .chunks(&config.chunking)
        .context("Failed to chunk document")?;

    println!(
        "  Document: {} ({} chars, {} chunks of {} with overlap {})",
        document.name,
        document.char_count(),
        chunks.len(),
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );

    println!("\nEmbedding chunks...");
    let index = VectorIndex::build(chunks, embedder.as_ref(), config.retrieval.build_options())
        .await
        .context("Failed to build vector index")?;

    let build_duration = start.elapsed();

    println!("\nVector Index Built:");
    println!("  Chunks:      {}", index.len());
    println!("  Dimension:   {}", index.dimension());
    println!("  Metric:      {:?}", index.metric());
    println!("  Build time:  {:.2?}", build_duration);

    save_index(&index, &output).context("Failed to save vector index")?;

    let size = index_size(&output)?;
    println!("\nIndex saved to: {}", output.display());
    println!("  File size: {:.1} KB", size as f64 / 1024.0);

    Ok(())
}

async fn cmd_query(
    config: Config,
    question: String,
    index_path: PathBuf,
    top_k: Option<usize>,
    as_context: bool,
) -> Result<()> {
    ensure_index(&index_path)?;
    config.validate().context("Invalid configuration")?;

    let index = load_index(&index_path).context("Failed to load vector index")?;
    let embedder = embedding::from_config(&config.embedding, config.retry)
        .context("Failed to create embedder")?;

    let retriever = Retriever::new(
        Arc::new(index),
        embedder,
        top_k.unwrap_or(config.retrieval.top_k),
        config.retrieval.timeout(),
    )
    .context("Invalid retrieval settings")?;

    println!("Query: \"{}\"", question);
    println!();

    let start = Instant::now();
    let results = retriever
        .retrieve_scored(&question)
        .await
        .context("Retrieval failed")?;
    let query_duration = start.elapsed();

    if as_context {
        println!("{}", format_context(&results));
        return Ok(());
    }

    println!("Results:");
    println!("{}", "─".repeat(60));

    for (i, result) in results.iter().enumerate() {
        println!(
            "{:>2}. Chunk {} [chars {}-{}] (score {:.3})",
            i + 1,
            result.chunk.id,
            result.chunk.start_offset,
            result.chunk.end_offset,
            result.score
        );
        let preview: String = result.chunk.text.chars().take(200).collect();
        println!("    {}", preview);
        if result.chunk.char_len() > 200 {
            println!("    ...");
        }
        println!();
    }

    println!("{}", "─".repeat(60));
    println!("Found {} results in {:.2?}", results.len(), query_duration);

    Ok(())
}

fn cmd_show(index_path: PathBuf, json: bool, text: bool) -> Result<()> {
    ensure_index(&index_path)?;

    let index = load_index(&index_path).context("Failed to load vector index")?;

    if text {
        let chunks: Vec<Chunk> = index.chunks().cloned().collect();
        println!("{}", reconstruct(&chunks));
    } else if json {
        let chunks: Vec<_> = index.chunks().collect();
        let json_str = serde_json::to_string_pretty(&chunks).context("Failed to serialize chunks")?;
        println!("{}", json_str);
    } else {
        for chunk in index.chunks() {
            let preview: String = chunk.text.chars().take(60).collect();
            println!(
                "[{:>4}] {:>7}..{:<7} {}",
                chunk.id, chunk.start_offset, chunk.end_offset, preview
            );
        }
    }

    Ok(())
}

fn cmd_info(index_path: PathBuf) -> Result<()> {
    ensure_index(&index_path)?;

    let index = load_index(&index_path).context("Failed to load vector index")?;
    let size = index_size(&index_path)?;
    let covered = index.chunks().map(|c| c.end_offset).max().unwrap_or(0);

    println!("Vector Index Information");
    println!("{}", "─".repeat(40));
    println!("  Embedder:     {}", index.embedder_id());
    println!("  Dimension:    {}", index.dimension());
    println!("  Metric:       {:?}", index.metric());
    println!("  Chunks:       {}", index.len());
    println!("  Text length:  {} chars", covered);
    println!("  File size:    {:.1} KB", size as f64 / 1024.0);
    println!("  Index path:   {}", index_path.display());

    Ok(())
}

async fn cmd_test(config: Config) -> Result<()> {
    println!("Testing embedding provider...\n");

    println!("Embedding configuration:");
    println!("  Provider:  {:?}", config.embedding.provider);
    println!("  Model:     {}", config.embedding.model);
    println!();

    match config.validate() {
        Err(e) => println!("Configuration error: {}", e),
        Ok(()) => match embedding::from_config(&config.embedding, config.retry) {
            Err(e) => println!("Embedder creation failed: {}", e),
            Ok(embedder) => match embedder.embed("hello world").await {
                Ok(vector) => println!(
                    "Embedding successful! {} ({} dimensions)",
                    embedder.model_id(),
                    vector.len()
                ),
                Err(e) => println!("Embedding failed: {}", e),
            },
        },
    }

    println!("\nTesting LLM connection...\n");

    let key_prefix: String = config.llm.api_key.chars().take(8).collect();
    println!("LLM configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!("  Model:     {}", config.llm.model);
    println!("  API Key:   {}...", key_prefix);
    println!();

    if let Err(e) = config.validate_llm() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm, config.retry);

    println!("Sending test request...");
    match client.test_connection().await {
        Ok(()) => println!("Connection successful!"),
        Err(e) => println!("Connection failed: {}", e),
    }

    Ok(())
}

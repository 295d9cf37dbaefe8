//! Evaluation CLI binary for retrieval-augmented answering.
//!
//! Usage:
//!   rag-eval sample              # Run on built-in sample dataset
//!   rag-eval custom <path>       # Run on custom JSON dataset
//!
//! Options:
//!   --max-items <N>              # Limit number of items
//!   --top-k <N>                  # Number of chunks to retrieve
//!   --chunk-size <N>             # Chunk size in characters
//!   --chunk-overlap <N>          # Chunk overlap in characters
//!   --fail-fast                  # Stop at the first item error
//!   --verbose                    # Verbose output
//!   --output <path>              # Save results to JSON file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_rag_indexer::config::Config;
use rust_rag_indexer::embedding;
use rust_rag_indexer::eval::{Dataset, EvalRunner, LlmJudge, RunnerConfig, sample_dataset};
use rust_rag_indexer::llm::LlmClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rag-eval")]
#[command(about = "Evaluate retrieval-augmented answers with an LLM judge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Maximum number of items to evaluate
    #[arg(long, global = true)]
    max_items: Option<usize>,

    /// Number of chunks to retrieve (defaults to the configured top_k)
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Chunk size in characters (defaults to the configured value)
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Chunk overlap in characters (defaults to the configured value)
    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,

    /// Abort on the first item error instead of recording it
    #[arg(long, global = true)]
    fail_fast: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Save results to JSON file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run on built-in sample dataset (for quick testing)
    Sample,

    /// Run on custom JSON dataset
    Custom {
        /// Path to custom dataset JSON file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(top_k) = cli.top_k {
        config.retrieval.top_k = top_k;
    }
    if let Some(size) = cli.chunk_size {
        config.chunking.chunk_size = size;
    }
    if let Some(overlap) = cli.chunk_overlap {
        config.chunking.chunk_overlap = overlap;
    }
    config.validate().context("Invalid configuration")?;
    config.validate_llm().context("Invalid LLM configuration")?;

    println!("LLM API Base: {}", config.llm.api_base);

    let dataset = match &cli.command {
        Commands::Sample => {
            println!("Using sample dataset...");
            sample_dataset()
        }
        Commands::Custom { path } => {
            println!("Loading custom dataset from {:?}...", path);
            Dataset::load_json(path).context("Failed to load dataset")?
        }
    };

    println!("Dataset: {} ({} items)", dataset.name, dataset.len());

    let embedder = embedding::from_config(&config.embedding, config.retry)
        .context("Failed to create embedder")?;
    println!("Embedder: {}", embedder.model_id());

    let client = LlmClient::new(config.llm.clone(), config.retry);
    println!("LLM Model: {}", client.model());
    let judge = LlmJudge::new(client.clone());

    let runner_config = RunnerConfig {
        max_items: cli.max_items,
        fail_fast: cli.fail_fast,
        ..RunnerConfig::from_config(&config)
    };

    let runner = EvalRunner::new(runner_config, embedder, Arc::new(client), Arc::new(judge))
        .context("Invalid evaluation settings")?;
    let report = runner.run(&dataset).await.context("Evaluation aborted")?;

    report.print_summary();

    if cli.verbose {
        for result in &report.item_results {
            match (&result.outcome, &result.error) {
                (Some(outcome), _) => println!(
                    "[{}] {} correctness={:.2} faithfulness={:.2} contextual_relevancy={:.2}",
                    result.item_id,
                    if outcome.passed { "PASS" } else { "FAIL" },
                    outcome.scores.correctness,
                    outcome.scores.faithfulness,
                    outcome.scores.contextual_relevancy
                ),
                (None, Some(error)) => println!("[{}] ERROR {}", result.item_id, error),
                (None, None) => {}
            }
        }
    }

    if let Some(output_path) = cli.output {
        report
            .save_json(&output_path)
            .context("Failed to save results")?;
        println!("Results saved to {:?}", output_path);
    }

    Ok(())
}

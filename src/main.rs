//! rag-context CLI Entry Point
//!
//! Subcommands:
//! - `rag-context ingest [dir]` - Index every matching file in a directory
//! - `rag-context add <source> <file>` - Index one file under a source identifier
//! - `rag-context query <text>` - Retrieve the most relevant chunks
//! - `rag-context sources` - List indexed documents
//! - `rag-context remove <source>` - Remove a document
//! - `rag-context clear` - Remove everything

use anyhow::{Context, Result};
use mcp_rag::cli::output::Output;
use mcp_rag::cli::{Cli, Commands};
use mcp_rag::utils::toml_config::LoggingConfig;
use mcp_rag::{AppState, RagConfig};
use owo_colors::OwoColorize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    let config = RagConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    init_tracing(&config.logging, cli.verbose);

    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let state = AppState::initialize(config).await?;
    let result = dispatch(&state, &output, cli.command).await;

    // Flush even when the command failed, so completed writes are kept.
    state.shutdown().await?;
    result
}

async fn dispatch(state: &AppState, output: &Output, command: Commands) -> Result<()> {
    match command {
        Commands::Ingest { dir, pattern } => {
            let dir = dir.unwrap_or_else(|| state.config.ingest.documents_dir.clone());
            let pattern = pattern.unwrap_or_else(|| state.config.ingest.pattern.clone());

            output.info(&format!("Ingesting {} ({})", dir.display(), pattern));
            let report = state.indexer.process_directory(&dir, &pattern).await?;
            output.ingest_summary(&report);
            output.json(&report)?;
        }
        Commands::Add { source, file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let chunks = state.indexer.process_document(&source, &text).await?;
            output.success(&format!("Indexed {} ({} chunks)", source, chunks));
            output.json(&json!({ "source": source, "chunks": chunks }))?;
        }
        Commands::Query { text, k } => {
            let results = match k {
                Some(k) => state.retriever.get_context(&text, k).await?,
                None => state.retriever.get_default_context(&text).await?,
            };
            if results.is_empty() {
                output.warning("No relevant context found");
            }
            output.json(&results)?;
        }
        Commands::Sources { detailed: false } => {
            let sources = state.index.list_sources().await?;
            output.json(&json!({ "sources": sources }))?;
        }
        Commands::Sources { detailed: true } => {
            let documents = state.index.list_documents().await?;
            output.json(&json!({ "documents": documents }))?;
        }
        Commands::Remove { source } => {
            let removed = state.indexer.remove_document(&source).await?;
            if removed == 0 {
                output.info(&format!("{} was not indexed", source));
            } else {
                output.success(&format!("Removed {} ({} chunks)", source, removed));
            }
            output.json(&json!({ "source": source, "removed": removed }))?;
        }
        Commands::Clear => {
            let removed = state.indexer.clear_all().await?;
            output.success(&format!("Cleared {} entries", removed));
            output.json(&json!({ "removed": removed }))?;
        }
    }
    Ok(())
}

fn init_tracing(config: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mcp_rag={0},rag_vector={0}", default_level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

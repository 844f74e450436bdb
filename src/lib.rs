//! # mcp-rag - Retrieval core for context-augmented assistants
//!
//! Ingests documents into a vector index and answers queries with the most
//! relevant chunks, ready to be injected into a generation prompt by whatever
//! glue sits on top.
//!
//! ## Overview
//!
//! mcp-rag can be used in two ways:
//!
//! 1. **As a CLI** - Run the `rag-context` binary to ingest, query and manage
//!    the index
//! 2. **As a library** - Build an [`AppState`] and call the indexer and
//!    retriever from your own service
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use mcp_rag::{AppState, RagConfig};
//!
//! #[tokio::main]
//! async fn main() -> mcp_rag::Result<()> {
//!     let config = RagConfig::load_or_default("rag.toml")?;
//!     let state = AppState::initialize(config).await?;
//!
//!     state.indexer.process_document("doc1", "The sky is blue.").await?;
//!     let context = state.retriever.get_context("what color is the sky", 1).await?;
//!     println!("{:?}", context);
//!
//!     state.shutdown().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`rag`] - Chunking, embedding providers, ingestion and retrieval
//! - [`db`] - Vector index trait and backends
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration
//! - [`cli`] - Command-line interface for the `rag-context` binary
//!
//! ## Architecture
//!
//! ```text
//! documents ──► Chunker ──► EmbeddingProvider ──► VectorIndex
//!                                                     │
//! query ──► EmbeddingProvider ──► VectorIndex::query ─┴─► ContextRetriever ──► results
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line interface definitions and output helpers.
pub mod cli;
/// Vector index abstraction and backends.
pub mod db;
/// Retrieval pipeline: chunking, embeddings, ingestion, retrieval.
#[allow(missing_docs)]
pub mod rag;
/// Common types and error handling.
#[allow(missing_docs)]
pub mod types;
/// Configuration utilities.
#[allow(missing_docs)]
pub mod utils;

// Re-export commonly used types
pub use db::vectorstore::{VectorIndex, VectorIndexProvider};
pub use rag::embeddings::EmbeddingProvider;
pub use rag::indexer::DocumentIndexer;
pub use rag::retriever::ContextRetriever;
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigError, RagConfig};

use std::sync::Arc;

use rag::chunker::TextChunker;
use rag::indexer::IndexerConfig;
use rag::retriever::RetrieverConfig;
use tracing::info;

/// Application state shared by the CLI and any embedding service
#[derive(Clone)]
pub struct AppState {
    /// Configuration the state was built from
    pub config: Arc<RagConfig>,
    /// Embedding provider shared by the indexer and the retriever
    pub embedder: Arc<dyn EmbeddingProvider>,
    /// The vector index
    pub index: Arc<dyn VectorIndex>,
    /// Document ingestion
    pub indexer: Arc<DocumentIndexer>,
    /// Query-time retrieval
    pub retriever: Arc<ContextRetriever>,
}

impl AppState {
    /// Build every component from `config`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the chunking or provider settings are unusable,
    /// `DimensionMismatch` if a persisted index was built with another
    /// dimension.
    pub async fn initialize(config: RagConfig) -> Result<Self> {
        let embedder = rag::embeddings::create_provider(&config.embedding)?;
        let index = config
            .index
            .vector_provider()
            .create_index(config.embedding.dimensions, config.index.metric)
            .await?;

        Self::with_components(config, embedder, index)
    }

    /// Assemble a state around an existing provider and index.
    pub fn with_components(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;

        let indexer = DocumentIndexer::new(chunker, embedder.clone(), index.clone())?.with_config(
            IndexerConfig {
                replace_strategy: config.ingest.replace_strategy,
                concurrency: config.ingest.concurrency,
            },
        );
        let retriever =
            ContextRetriever::new(embedder.clone(), index.clone()).with_config(RetrieverConfig {
                default_k: config.retrieval.default_k,
                min_score: config.retrieval.min_score,
            });

        info!(
            model = embedder.model_name(),
            dimensions = index.dimensions(),
            backend = index.provider_name(),
            "Retrieval core initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            embedder,
            index,
            indexer: Arc::new(indexer),
            retriever: Arc::new(retriever),
        })
    }

    /// Flush the index to durable storage.
    pub async fn shutdown(&self) -> Result<()> {
        self.index.flush().await?;
        info!("Index flushed");
        Ok(())
    }
}

//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! Components that turn documents into searchable context and queries into
//! ranked chunks.
//!
//! # Module Structure
//!
//! - [`rag::chunker`](crate::rag::chunker) - Paragraph/sentence-aware text chunking
//! - [`rag::embeddings`](crate::rag::embeddings) - Embedding providers (OpenAI-compatible, Ollama)
//! - [`rag::cache`](crate::rag::cache) - LRU cache in front of any provider
//! - [`rag::indexer`](crate::rag::indexer) - Document and directory ingestion
//! - [`rag::retriever`](crate::rag::retriever) - Query-time context retrieval
//!
//! # RAG Pipeline
//!
//! 1. **Ingestion** - Documents are chunked and embedded
//! 2. **Storage** - Embeddings stored in the vector index
//! 3. **Retrieval** - Query embedded, similar chunks retrieved
//! 4. **Generation** - The caller injects the chosen context into its prompt
//!
//! # Example
//!
//! ```ignore
//! use mcp_rag::rag::{chunker::TextChunker, indexer::DocumentIndexer, retriever::ContextRetriever};
//!
//! let indexer = DocumentIndexer::new(TextChunker::new(1000, 200)?, embedder.clone(), index.clone())?;
//! indexer.process_document("doc1", &text).await?;
//!
//! let retriever = ContextRetriever::new(embedder, index);
//! let results = retriever.get_context("what color is the sky", 3).await?;
//! ```

pub mod cache;
pub mod chunker;
pub mod embeddings;
pub mod indexer;
pub mod retriever;

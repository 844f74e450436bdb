//! Query-time context retrieval.
//!
//! [`ContextRetriever::get_context`] embeds a query, searches the index and
//! returns the ranked chunks as [`RetrievalResult`] records. An empty result
//! means nothing relevant was found; a failed embedding or search is an error.
//! Which result (if any) ends up in a prompt is the caller's decision, see
//! [`select_best`].

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::db::vectorstore::VectorIndex;
use crate::rag::embeddings::EmbeddingProvider;
use crate::types::{AppError, Result, RetrievalResult};

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub default_k: usize,
    /// Results scoring below this are dropped.
    pub min_score: Option<f32>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            default_k: 3,
            min_score: None,
        }
    }
}

pub struct ContextRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: RetrieverConfig,
}

impl ContextRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            config: RetrieverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetrieverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Return up to `k` chunks relevant to `query`, best first.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank query, `DimensionMismatch` if the provider's
    /// vectors do not fit the index, and any provider error as-is.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn get_context(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("query must not be empty".to_string()));
        }

        let vector = self.embedder.embed(query).await?;
        let hits = self.index.query(&vector, k).await?;
        let total = hits.len();

        let results: Vec<RetrievalResult> = hits
            .into_iter()
            .filter(|hit| self.config.min_score.map_or(true, |min| hit.score >= min))
            .map(RetrievalResult::from)
            .collect();

        debug!(hits = total, returned = results.len(), "Retrieved context");
        Ok(results)
    }

    /// [`get_context`](Self::get_context) with the configured default `k`.
    pub async fn get_default_context(&self, query: &str) -> Result<Vec<RetrievalResult>> {
        self.get_context(query, self.config.default_k).await
    }
}

/// The highest-scoring result; the earliest one wins a tie.
pub fn select_best(results: &[RetrievalResult]) -> Option<&RetrievalResult> {
    results.iter().reduce(|best, r| if r.score > best.score { r } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(source: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            source: source.to_string(),
            chunk_index: 0,
            content: format!("{} content", source),
            score,
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_select_best() {
        assert!(select_best(&[]).is_none());

        let results = vec![result("a", 0.4), result("b", 0.9), result("c", 0.9)];
        assert_eq!(select_best(&results).map(|r| r.source.as_str()), Some("b"));
    }

    #[test]
    fn test_default_config() {
        let config = RetrieverConfig::default();
        assert_eq!(config.default_k, 3);
        assert!(config.min_score.is_none());
    }
}

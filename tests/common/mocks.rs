//! Mock embedding providers for testing.
//!
//! These providers are deterministic and run without network access, so the
//! ingestion and retrieval pipeline can be exercised end to end.

use async_trait::async_trait;
use mcp_rag::types::{AppError, Result};
use mcp_rag::EmbeddingProvider;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bag-of-words embeddings over a fixed vocabulary.
///
/// Each dimension counts one vocabulary word, so texts sharing words score
/// high under cosine similarity and texts with no shared words score 0.
///
/// # Examples
///
/// ```ignore
/// let provider = KeywordEmbeddings::new(&["sky", "blue", "grass", "green"]);
/// let v = provider.embed("The sky is blue.").await?; // [1, 1, 0, 0]
/// ```
pub struct KeywordEmbeddings {
    vocabulary: Vec<String>,
    /// Texts containing this marker fail with `ProviderUnavailable`.
    fail_marker: Option<String>,
    calls: AtomicUsize,
}

impl KeywordEmbeddings {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
            fail_marker: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// The vocabulary used by the scenario tests.
    pub fn colors() -> Self {
        Self::new(&[
            "sky", "blue", "grass", "green", "water", "wet", "sun", "yellow",
        ])
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Number of `embed_many` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        self.vocabulary
            .iter()
            .map(|v| words.iter().filter(|w| *w == v).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbeddings {
    fn model_name(&self) -> &str {
        "keyword-mock"
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(AppError::InvalidInput(format!("empty text at {}", pos)));
        }
        if let Some(marker) = &self.fail_marker {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                return Err(AppError::ProviderUnavailable(
                    "mock provider unavailable".to_string(),
                ));
            }
        }

        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// A provider that is always down.
pub struct UnavailableEmbeddings {
    pub dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for UnavailableEmbeddings {
    fn model_name(&self) -> &str {
        "unavailable-mock"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(AppError::ProviderUnavailable(
            "mock provider unavailable".to_string(),
        ))
    }
}

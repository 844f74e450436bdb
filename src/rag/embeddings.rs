//! Embedding providers.
//!
//! An [`EmbeddingProvider`] maps text to fixed-length vectors. Two HTTP
//! providers ship with the crate:
//!
//! - [`OpenAiEmbeddings`] - any OpenAI-compatible `/embeddings` endpoint
//!   (default model `text-embedding-ada-002`, 1536 dimensions)
//! - [`OllamaEmbeddings`] - a local Ollama server's `/api/embed` endpoint
//!
//! Transport failures, timeouts, rate limiting (429) and server errors (5xx)
//! surface as [`AppError::ProviderUnavailable`]. Rejected credentials surface
//! as [`AppError::InvalidConfig`]; any other 4xx as [`AppError::InvalidInput`].
//! Nothing is retried here.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_rag::rag::embeddings::{EmbeddingProvider, OllamaEmbeddings};
//!
//! let provider = OllamaEmbeddings::new("http://localhost:11434", "nomic-embed-text", 768)?;
//! let vectors = provider.embed_many(&["first".into(), "second".into()]).await?;
//! assert_eq!(vectors.len(), 2);
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::rag::cache::CachedEmbeddings;
use crate::types::{AppError, Result};
use crate::utils::toml_config::{EmbeddingBackend, EmbeddingConfig};

// ============================================================================
// Provider Trait
// ============================================================================

/// Maps text to vectors of a fixed dimension.
///
/// Implementations must return vectors in input order. Providers with
/// different models or dimensions must not share one vector index.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the underlying model.
    fn model_name(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for empty text, `ProviderUnavailable` for transient
    /// failures.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::Internal("provider returned no embedding".to_string()))
    }

    /// Embed a batch of texts, preserving order.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Build the provider described by `config`, wrapped in an LRU cache when
/// `cache_capacity` is non-zero.
///
/// # Errors
///
/// `InvalidConfig` if the provider cannot be constructed (e.g. a missing API
/// key or an unusable base URL).
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingBackend::OpenAi => Arc::new(OpenAiEmbeddings::from_config(config)?),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbeddings::from_config(config)?),
    };

    match std::num::NonZeroUsize::new(config.cache_capacity) {
        Some(capacity) => Ok(Arc::new(CachedEmbeddings::new(provider, capacity))),
        None => Ok(provider),
    }
}

// ============================================================================
// Shared HTTP Helpers
// ============================================================================

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))
}

fn reject_empty(texts: &[String]) -> Result<()> {
    if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(AppError::InvalidInput(format!(
            "cannot embed empty text (input {})",
            pos
        )));
    }
    Ok(())
}

fn transport_error(provider: &str, err: reqwest::Error) -> AppError {
    AppError::ProviderUnavailable(format!("{} request failed: {}", provider, err))
}

fn status_error(provider: &str, status: StatusCode, body: &str) -> AppError {
    let msg = format!("{} embedding request failed ({}): {}", provider, status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::InvalidConfig(msg),
        StatusCode::TOO_MANY_REQUESTS => AppError::ProviderUnavailable(msg),
        s if s.is_server_error() => AppError::ProviderUnavailable(msg),
        _ => AppError::InvalidInput(msg),
    }
}

fn check_vectors(expected_count: usize, dimensions: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(AppError::Internal(format!(
            "provider returned {} embeddings for {} inputs",
            vectors.len(),
            expected_count
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(AppError::DimensionMismatch {
            expected: dimensions,
            actual: bad.len(),
        });
    }
    Ok(())
}

async fn post_json<B, R>(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    api_key: Option<&str>,
    body: &B,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: for<'de> Deserialize<'de>,
{
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(status_error(provider, status, &text));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to parse {} response: {}", provider, e)))
}

// ============================================================================
// OpenAI-compatible Provider
// ============================================================================

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-compatible embeddings endpoint (`POST {base_url}/embeddings`).
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OpenAiEmbeddings {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(30))?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            dimensions,
            batch_size: 64,
        })
    }

    /// Build from config, reading the API key from `config.api_key_env`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the key is missing while targeting the default
    /// OpenAI endpoint. Custom endpoints may run without a key.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());

        if api_key.is_none() && config.base_url.is_none() {
            return Err(AppError::InvalidConfig(format!(
                "environment variable {} is not set",
                config.api_key_env
            )));
        }

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string());

        Ok(Self::new(base_url, api_key, config.model.clone(), config.dimensions)?
            .with_timeout(Duration::from_secs(config.timeout_secs))?
            .with_batch_size(config.batch_size))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn request(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = OpenAiRequest {
            model: &self.model,
            input: batch,
        };

        let mut response: OpenAiResponse =
            post_json(&self.client, "OpenAI", &url, self.api_key.as_deref(), &body).await?;

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        reject_empty(texts)?;

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.request(batch).await?;
            check_vectors(batch.len(), self.dimensions, &embedded)?;
            vectors.extend(embedded);
        }

        debug!(count = vectors.len(), "Embedded texts");
        Ok(vectors)
    }
}

// ============================================================================
// Ollama Provider
// ============================================================================

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Local Ollama server (`POST {base_url}/api/embed`).
pub struct OllamaEmbeddings {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OllamaEmbeddings {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";

    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(30))?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
            batch_size: 64,
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string());

        Ok(Self::new(base_url, config.model.clone(), config.dimensions)?
            .with_timeout(Duration::from_secs(config.timeout_secs))?
            .with_batch_size(config.batch_size))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        reject_empty(texts)?;

        let url = format!("{}/api/embed", self.base_url);
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = OllamaRequest {
                model: &self.model,
                input: batch,
            };
            let response: OllamaResponse =
                post_json(&self.client, "Ollama", &url, None, &body).await?;
            check_vectors(batch.len(), self.dimensions, &response.embeddings)?;
            vectors.extend(response.embeddings);
        }

        debug!(count = vectors.len(), "Embedded texts");
        Ok(vectors)
    }
}

//! TOML-based configuration for the retrieval core
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working in-memory setup. Secrets are never stored in the file: providers
//! reference the *name* of the environment variable holding them.
//!
//! # Example
//!
//! ```toml
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-ada-002"
//! api_key_env = "OPENAI_API_KEY"
//! dimensions = 1536
//!
//! [index]
//! provider = "local"
//! path = "./data/index"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [retrieval]
//! default_k = 3
//! min_score = 0.2
//! ```
//!
//! # Environment Overrides
//!
//! | Variable                  | Field                  |
//! |---------------------------|------------------------|
//! | `RAG_EMBEDDING_PROVIDER`  | `embedding.provider`   |
//! | `RAG_EMBEDDING_MODEL`     | `embedding.model`      |
//! | `RAG_EMBEDDING_BASE_URL`  | `embedding.base_url`   |
//! | `RAG_EMBEDDING_DIMENSIONS`| `embedding.dimensions` |
//! | `RAG_INDEX_PROVIDER`      | `index.provider`       |
//! | `RAG_INDEX_PATH`          | `index.path`           |
//! | `RAG_DOCUMENTS_DIR`       | `ingest.documents_dir` |
//! | `RAG_LOG_LEVEL`           | `logging.level`        |

use rag_vector::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::db::vectorstore::VectorIndexProvider;
use crate::rag::indexer::ReplaceStrategy;
use crate::types::AppError;

/// Root configuration structure loaded from rag.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============= Embedding Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingBackend {
    /// OpenAI `/embeddings` API and compatible servers
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(EmbeddingBackend::OpenAi),
            "ollama" => Ok(EmbeddingBackend::Ollama),
            other => Err(ConfigError::ValidationError(format!(
                "unknown embedding provider '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Override the provider's default endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable name containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum texts per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// LRU entries kept in memory; 0 disables the cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    64
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            model: default_embedding_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            dimensions: default_dimensions(),
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

// ============= Index Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Memory,
    #[default]
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub provider: IndexBackend,

    /// Data directory for the `local` backend
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    #[serde(default = "default_true")]
    pub auto_persist: bool,

    #[serde(default)]
    pub metric: DistanceMetric,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/index")
}

fn default_true() -> bool {
    true
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: IndexBackend::default(),
            path: default_index_path(),
            auto_persist: true,
            metric: DistanceMetric::default(),
        }
    }
}

impl IndexConfig {
    pub fn vector_provider(&self) -> VectorIndexProvider {
        match self.provider {
            IndexBackend::Memory => VectorIndexProvider::Memory,
            IndexBackend::Local => VectorIndexProvider::Local {
                path: self.path.clone(),
                auto_persist: self.auto_persist,
            },
        }
    }
}

// ============= Chunking Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

// ============= Retrieval Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Drop results scoring below this value
    #[serde(default)]
    pub min_score: Option<f32>,
}

fn default_k() -> usize {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            min_score: None,
        }
    }
}

// ============= Ingestion Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    /// Glob matched against paths relative to the ingested directory
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Documents processed at the same time by `process_directory`
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub replace_strategy: ReplaceStrategy,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./documents")
}

fn default_pattern() -> String {
    "**/*.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            pattern: default_pattern(),
            concurrency: default_concurrency(),
            replace_strategy: ReplaceStrategy::default(),
        }
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ReadError(e) => AppError::Io(e),
            other => AppError::InvalidConfig(other.to_string()),
        }
    }
}

impl RagConfig {
    /// Load configuration from a TOML file, apply `RAG_*` overrides and
    /// validate the result.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config: RagConfig = toml::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        debug!(path = %path.display(), "No configuration file, using defaults");
        let mut config = RagConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("RAG_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(model) = get("RAG_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = get("RAG_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(url);
        }
        if let Some(dims) = get("RAG_EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = dims.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "RAG_EMBEDDING_DIMENSIONS must be a positive integer, got '{}'",
                    dims
                ))
            })?;
        }
        if let Some(provider) = get("RAG_INDEX_PROVIDER") {
            self.index.provider = match provider.to_lowercase().as_str() {
                "memory" => IndexBackend::Memory,
                "local" => IndexBackend::Local,
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "unknown index provider '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(path) = get("RAG_INDEX_PATH") {
            self.index.path = PathBuf::from(path);
        }
        if let Some(dir) = get("RAG_DOCUMENTS_DIR") {
            self.ingest.documents_dir = PathBuf::from(dir);
        }
        if let Some(level) = get("RAG_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be greater than 0".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.retrieval.default_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.default_k must be at least 1".to_string(),
            ));
        }
        if self.ingest.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.concurrency must be at least 1".to_string(),
            ));
        }
        if let Err(e) = glob::Pattern::new(&self.ingest.pattern) {
            return Err(ConfigError::ValidationError(format!(
                "ingest.pattern is not a valid glob: {}",
                e
            )));
        }

        // The hosted OpenAI endpoint needs a key; custom endpoints may not.
        if self.embedding.provider == EmbeddingBackend::OpenAi && self.embedding.base_url.is_none()
        {
            self.validate_env_var(&self.embedding.api_key_env)?;
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }
}

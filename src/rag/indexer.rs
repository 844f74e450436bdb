//! Document ingestion.
//!
//! The [`DocumentIndexer`] turns documents into index entries: chunk the text,
//! embed every chunk in one batch, and write the batch for the document's
//! source identifier. Re-ingesting a source replaces all of its previous
//! entries.
//!
//! # Replace Strategies
//!
//! | Strategy      | Order                                  | Embedding failure leaves |
//! |---------------|----------------------------------------|--------------------------|
//! | `delete-first`| delete source, embed, upsert           | the source removed       |
//! | `atomic`      | embed, then delete + upsert in one lock| the previous version     |
//!
//! Ingestion of the same source is serialized; different sources run
//! concurrently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::db::vectorstore::VectorIndex;
use crate::rag::chunker::TextChunker;
use crate::rag::embeddings::EmbeddingProvider;
use crate::types::{
    AppError, ChunkId, DirectoryReport, Document, IndexEntry, IngestOutcome, IngestStatus, Result,
};

/// Metadata key holding a file's modification time (RFC 3339).
pub const FILE_MODIFIED_KEY: &str = "file_modified";

/// How a re-ingested source replaces its previous entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceStrategy {
    /// Delete the old entries before embedding the new text.
    #[default]
    DeleteFirst,
    /// Embed first, then swap old for new entries in one index operation.
    Atomic,
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub replace_strategy: ReplaceStrategy,
    /// Documents processed at once by [`DocumentIndexer::process_directory`].
    pub concurrency: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            replace_strategy: ReplaceStrategy::default(),
            concurrency: 4,
        }
    }
}

type SourceLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

pub struct DocumentIndexer {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: IndexerConfig,
    locks: SourceLocks,
}

impl DocumentIndexer {
    /// # Errors
    ///
    /// `DimensionMismatch` if the provider and the index disagree on the
    /// vector dimension.
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        if embedder.dimensions() != index.dimensions() {
            return Err(AppError::DimensionMismatch {
                expected: index.dimensions(),
                actual: embedder.dimensions(),
            });
        }
        Ok(Self {
            chunker,
            embedder,
            index,
            config: IndexerConfig::default(),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_config(mut self, config: IndexerConfig) -> Self {
        self.config = IndexerConfig {
            concurrency: config.concurrency.max(1),
            ..config
        };
        self
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Chunk, embed and index `text` under `source_id`.
    ///
    /// # Returns
    ///
    /// The number of chunks written.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty source identifier or blank text; any
    /// provider or index error otherwise.
    pub async fn process_document(&self, source_id: &str, text: &str) -> Result<usize> {
        self.process(source_id, text, None).await
    }

    /// Like [`process_document`](Self::process_document), recording the
    /// document's modification time in each entry's metadata.
    pub async fn process_document_with(&self, document: &Document) -> Result<usize> {
        self.process(&document.source_id, &document.text, document.last_modified)
            .await
    }

    #[instrument(skip(self, text), fields(source = %source_id, len = text.len()))]
    async fn process(
        &self,
        source_id: &str,
        text: &str,
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        validate_source(source_id)?;
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "document '{}' has no text",
                source_id
            )));
        }

        let started = Instant::now();
        let lock = self.source_lock(source_id);
        let written = {
            let _guard = lock.lock().await;
            let chunks = self.chunker.chunk(text);

            match self.config.replace_strategy {
                ReplaceStrategy::DeleteFirst => {
                    let removed = self.index.delete_by_source(source_id).await?;
                    debug!(removed, "Removed previous entries");
                    let entries = self.embed_chunks(source_id, chunks, last_modified).await?;
                    self.index.upsert(entries).await?
                }
                ReplaceStrategy::Atomic => {
                    let entries = self.embed_chunks(source_id, chunks, last_modified).await?;
                    self.index.replace_source(source_id, entries).await?
                }
            }
        };
        drop(lock);
        self.release_locks();

        info!(
            chunks = written,
            duration_ms = started.elapsed().as_millis() as u64,
            "Indexed document"
        );
        Ok(written)
    }

    async fn embed_chunks(
        &self,
        source_id: &str,
        chunks: Vec<String>,
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<Vec<IndexEntry>> {
        let vectors = self.embedder.embed_many(&chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(AppError::Internal(format!(
                "provider returned {} embeddings for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let now = Utc::now();
        let metadata: std::collections::BTreeMap<String, String> = last_modified
            .map(|t| (FILE_MODIFIED_KEY.to_string(), t.to_rfc3339()))
            .into_iter()
            .collect();

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (content, embedding))| IndexEntry {
                id: ChunkId::new(source_id, i),
                embedding,
                content,
                last_updated: Some(now),
                metadata: metadata.clone(),
            })
            .collect())
    }

    /// Ingest every file under `dir` whose relative path matches `pattern`.
    ///
    /// Files are visited recursively in sorted order and their paths are used
    /// as source identifiers. A file that cannot be read, is not UTF-8 or
    /// fails to ingest is reported in the outcome list; the others still run.
    ///
    /// # Errors
    ///
    /// `NotFound` if `dir` does not exist, `InvalidInput` if it is not a
    /// directory or `pattern` is not a valid glob.
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub async fn process_directory(&self, dir: &Path, pattern: &str) -> Result<DirectoryReport> {
        let meta = tokio::fs::metadata(dir).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::NotFound(format!("directory '{}'", dir.display()))
            }
            _ => AppError::Io(e),
        })?;
        if !meta.is_dir() {
            return Err(AppError::InvalidInput(format!(
                "'{}' is not a directory",
                dir.display()
            )));
        }
        let glob = glob::Pattern::new(pattern)
            .map_err(|e| AppError::InvalidInput(format!("invalid pattern '{}': {}", pattern, e)))?;

        let root = dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || collect_files(&root, &glob))
            .await
            .map_err(|e| AppError::Internal(format!("directory walk panicked: {}", e)))?;
        info!(files = files.len(), "Processing directory");

        let outcomes: Vec<IngestOutcome> = stream::iter(files)
            .map(|path| async move {
                let source = path.to_string_lossy().into_owned();
                let status = match self.ingest_file(&path).await {
                    Ok(chunks) => IngestStatus::Indexed { chunks },
                    Err(e) => {
                        warn!(source = %source, error = %e, "Failed to ingest file");
                        IngestStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                IngestOutcome { source, status }
            })
            .buffered(self.config.concurrency)
            .collect()
            .await;

        let report = DirectoryReport { outcomes };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            chunks = report.total_chunks(),
            "Directory processed"
        );
        Ok(report)
    }

    async fn ingest_file(&self, path: &Path) -> Result<usize> {
        let bytes = tokio::fs::read(path).await?;
        let text = String::from_utf8(bytes).map_err(|_| {
            AppError::InvalidInput(format!("'{}' is not valid UTF-8", path.display()))
        })?;

        let mut document = Document::new(path.to_string_lossy(), text);
        if let Ok(modified) = tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            document = document.with_last_modified(DateTime::<Utc>::from(modified));
        }
        self.process_document_with(&document).await
    }

    /// Remove every entry of `source_id`. Unknown sources are a no-op.
    ///
    /// # Returns
    ///
    /// The number of entries removed.
    #[instrument(skip(self))]
    pub async fn remove_document(&self, source_id: &str) -> Result<usize> {
        validate_source(source_id)?;
        let lock = self.source_lock(source_id);
        let removed = {
            let _guard = lock.lock().await;
            self.index.delete_by_source(source_id).await?
        };
        drop(lock);
        self.release_locks();

        if removed == 0 {
            debug!("Source not indexed, nothing to remove");
        } else {
            info!(removed, "Removed document");
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<usize> {
        let removed = self.index.clear().await?;
        info!(removed, "Cleared index");
        Ok(removed)
    }

    fn source_lock(&self, source_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(source_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop locks nobody holds or waits on.
    fn release_locks(&self) {
        self.locks.lock().retain(|_, l| Arc::strong_count(l) > 1);
    }
}

fn validate_source(source_id: &str) -> Result<()> {
    if source_id.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "source identifier must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn collect_files(root: &Path, pattern: &glob::Pattern) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .map(|rel| pattern.matches_path(rel))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect()
}

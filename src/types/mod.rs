use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============= Document Types =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
            last_modified: None,
        }
    }

    pub fn with_last_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(modified);
        self
    }
}

/// Identity of a chunk: unique per (source, chunk index) within the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    pub source: String,
    pub chunk_index: usize,
}

impl ChunkId {
    pub fn new(source: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            source: source.into(),
            chunk_index,
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.source, self.chunk_index)
    }
}

// ============= Listing Types =============

/// A stored chunk as listed under its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_index: usize,
    pub content: String,
}

/// Everything indexed for one source, chunks in chunk order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub chunks: Vec<Chunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

// ============= Index Types =============

/// A stored row: chunk identity, its embedding, the chunk text and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: ChunkId,
    pub embedding: Vec<f32>,
    pub content: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, String>,
}

impl IndexEntry {
    pub fn source(&self) -> &str {
        &self.id.source
    }
}

#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    pub score: f32,
}

/// A ranked chunk returned for a query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl From<ScoredEntry> for RetrievalResult {
    fn from(scored: ScoredEntry) -> Self {
        let ScoredEntry { entry, score } = scored;
        let mut metadata = entry.metadata;
        if let Some(updated) = entry.last_updated {
            metadata.insert("last_updated".to_string(), updated.to_rfc3339());
        }
        Self {
            source: entry.id.source,
            chunk_index: entry.id.chunk_index,
            content: entry.content,
            score,
            metadata,
        }
    }
}

// ============= Ingestion Reports =============

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub source: String,
    #[serde(flatten)]
    pub status: IngestStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestStatus {
    Indexed { chunks: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectoryReport {
    pub outcomes: Vec<IngestOutcome>,
}

impl DirectoryReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, IngestStatus::Indexed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn total_chunks(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                IngestStatus::Indexed { chunks } => chunks,
                IngestStatus::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn outcome(&self, source: &str) -> Option<&IngestStatus> {
        self.outcomes
            .iter()
            .find(|o| o.source == source)
            .map(|o| &o.status)
    }
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Only transient provider failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ProviderUnavailable(_))
    }
}

impl From<rag_vector::Error> for AppError {
    fn from(err: rag_vector::Error) -> Self {
        use rag_vector::Error as E;
        match err {
            E::DimensionMismatch { expected, actual } => {
                AppError::DimensionMismatch { expected, actual }
            }
            E::InvalidVector(msg) | E::InvalidRecord(msg) => AppError::InvalidInput(msg),
            E::CollectionNotFound(name) => AppError::NotFound(format!("collection '{}'", name)),
            E::Configuration(msg) => AppError::InvalidConfig(msg),
            E::Io(e) => AppError::Io(e),
            other => AppError::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_display() {
        assert_eq!(ChunkId::new("docs/a.md", 3).to_string(), "docs/a.md_3");
    }

    #[test]
    fn test_retrieval_result_from_entry() {
        let entry = IndexEntry {
            id: ChunkId::new("doc1", 0),
            embedding: vec![1.0, 0.0],
            content: "The sky is blue.".to_string(),
            last_updated: None,
            metadata: BTreeMap::from([("file_modified".to_string(), "x".to_string())]),
        };

        let result = RetrievalResult::from(ScoredEntry { entry, score: 0.9 });
        assert_eq!(result.source, "doc1");
        assert_eq!(result.chunk_index, 0);
        assert_eq!(result.metadata.get("file_modified").map(String::as_str), Some("x"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["content"], "The sky is blue.");
    }

    #[test]
    fn test_vector_errors_map_to_taxonomy() {
        let err: AppError = rag_vector::Error::DimensionMismatch {
            expected: 3,
            actual: 2,
        }
        .into();
        assert!(matches!(
            err,
            AppError::DimensionMismatch { expected: 3, actual: 2 }
        ));

        let err: AppError = rag_vector::Error::Persistence("bad".into()).into();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(!err.is_retryable());
        assert!(AppError::ProviderUnavailable("x".into()).is_retryable());
    }

    #[test]
    fn test_directory_report_counts() {
        let report = DirectoryReport {
            outcomes: vec![
                IngestOutcome {
                    source: "a.md".into(),
                    status: IngestStatus::Indexed { chunks: 2 },
                },
                IngestOutcome {
                    source: "b.md".into(),
                    status: IngestStatus::Failed {
                        error: "boom".into(),
                    },
                },
            ],
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total_chunks(), 2);
        assert!(matches!(
            report.outcome("b.md"),
            Some(IngestStatus::Failed { .. })
        ));
    }
}

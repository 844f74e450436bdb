//! Local Vector Index
//!
//! [`VectorIndex`] backed by the embedded `rag-vector` store. All entries live
//! in a single collection; each entry's source identifier is its record group,
//! so deleting or replacing a source is one atomic operation.
//!
//! # Record Layout
//!
//! | Record field | Value                                      |
//! |--------------|--------------------------------------------|
//! | `id`         | `"{source}_{chunk_index}"`                 |
//! | `group`      | source identifier                          |
//! | metadata     | `content`, `chunk_index`, `last_updated`,  |
//! |              | plus caller metadata under `meta.{key}`    |
//!
//! # Example
//!
//! ```rust,ignore
//! let index = LocalVectorIndex::persistent("./data/index", 1536, DistanceMetric::Cosine, true).await?;
//! index.upsert(entries).await?;
//! let top = index.query(&embedding, 3).await?;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rag_vector::{
    CollectionStats, Config, DistanceMetric, MetadataValue, Record, VectorDb, VectorMetadata,
};
use tracing::{debug, info, instrument, warn};

use super::vectorstore::VectorIndex;
use crate::types::{AppError, Chunk, ChunkId, IndexEntry, Result, ScoredEntry, SourceDocument};

const COLLECTION: &str = "documents";

const KEY_CONTENT: &str = "content";
const KEY_CHUNK_INDEX: &str = "chunk_index";
const KEY_LAST_UPDATED: &str = "last_updated";
const META_PREFIX: &str = "meta.";

// ============================================================================
// Local Index Implementation
// ============================================================================

/// Embedded vector index, in memory or persisted to a directory.
pub struct LocalVectorIndex {
    /// The underlying vector database (VectorDb is Clone and uses Arc internally)
    db: VectorDb,
    dimensions: usize,
    persistent: bool,
}

impl LocalVectorIndex {
    /// Open an index with the given database configuration.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the stored collection was created with a
    /// different dimension.
    #[instrument(skip(config), fields(persistent = config.data_path.is_some()))]
    pub async fn open(config: Config, dimensions: usize, metric: DistanceMetric) -> Result<Self> {
        let persistent = config.data_path.is_some();
        let db = VectorDb::open(config).await?;

        if db.collection_exists(COLLECTION) {
            let collection = db.get_collection(COLLECTION)?;
            if collection.dimensions() != dimensions {
                return Err(AppError::DimensionMismatch {
                    expected: dimensions,
                    actual: collection.dimensions(),
                });
            }
            if collection.metric() != metric {
                warn!(
                    stored = %collection.metric(),
                    requested = %metric,
                    "Index was built with a different metric; keeping the stored one"
                );
            }
            info!(entries = collection.len(), "Opened existing index");
        } else {
            db.create_collection(COLLECTION, dimensions, metric).await?;
        }

        Ok(Self {
            db,
            dimensions,
            persistent,
        })
    }

    pub async fn in_memory(dimensions: usize, metric: DistanceMetric) -> Result<Self> {
        Self::open(Config::memory(), dimensions, metric).await
    }

    pub async fn persistent(
        path: impl Into<PathBuf>,
        dimensions: usize,
        metric: DistanceMetric,
        auto_persist: bool,
    ) -> Result<Self> {
        let config = Config::persistent(path.into()).with_auto_persist(auto_persist);
        Self::open(config, dimensions, metric).await
    }

    pub fn stats(&self) -> Result<CollectionStats> {
        Ok(self.db.collection_stats(COLLECTION)?)
    }
}

fn to_record(entry: IndexEntry) -> Record {
    let mut metadata = VectorMetadata::new();
    metadata.insert(KEY_CONTENT, entry.content);
    metadata.insert(KEY_CHUNK_INDEX, entry.id.chunk_index);
    if let Some(updated) = entry.last_updated {
        metadata.insert(KEY_LAST_UPDATED, updated.to_rfc3339());
    }
    for (key, value) in entry.metadata {
        metadata.insert(format!("{}{}", META_PREFIX, key), value);
    }

    Record::new(
        entry.id.to_string(),
        entry.id.source,
        entry.embedding,
        metadata,
    )
}

fn from_record(record: Record) -> Result<IndexEntry> {
    let corrupt = |what: &str| AppError::Storage(format!("record '{}' {}", record.id, what));

    let chunk_index = record
        .metadata
        .get_int(KEY_CHUNK_INDEX)
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| corrupt("has no chunk index"))?;
    let content = record
        .metadata
        .get_string(KEY_CONTENT)
        .ok_or_else(|| corrupt("has no content"))?
        .to_string();
    let last_updated = match record.metadata.get_string(KEY_LAST_UPDATED) {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|_| corrupt("has an invalid timestamp"))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let metadata: BTreeMap<String, String> = record
        .metadata
        .iter()
        .filter_map(|(key, value)| {
            let key = key.strip_prefix(META_PREFIX)?;
            let value = match value {
                MetadataValue::String(s) => s.clone(),
                MetadataValue::Int(i) => i.to_string(),
                MetadataValue::Float(f) => f.to_string(),
                MetadataValue::Bool(b) => b.to_string(),
            };
            Some((key.to_string(), value))
        })
        .collect();

    Ok(IndexEntry {
        id: ChunkId::new(record.group, chunk_index),
        embedding: record.vector,
        content,
        last_updated,
        metadata,
    })
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    fn provider_name(&self) -> &'static str {
        if self.persistent {
            "local"
        } else {
            "memory"
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize> {
        let records: Vec<Record> = entries.into_iter().map(to_record).collect();
        let written = self.db.upsert_batch(COLLECTION, records).await?;
        debug!(written, "Upserted entries");
        Ok(written)
    }

    #[instrument(skip(self))]
    async fn delete_by_source(&self, source_id: &str) -> Result<usize> {
        let removed = self.db.delete_group(COLLECTION, source_id).await?;
        debug!(removed, "Deleted source entries");
        Ok(removed)
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn replace_source(&self, source_id: &str, entries: Vec<IndexEntry>) -> Result<usize> {
        let records: Vec<Record> = entries.into_iter().map(to_record).collect();
        let (removed, inserted) = self
            .db
            .replace_group(COLLECTION, source_id, records)
            .await?;
        debug!(removed, inserted, "Replaced source entries");
        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<usize> {
        Ok(self.db.clear(COLLECTION).await?)
    }

    #[instrument(skip(self, vector), fields(dim = vector.len()))]
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        let results = self.db.search(COLLECTION, vector, k).await?;
        results
            .into_iter()
            .map(|r| {
                Ok(ScoredEntry {
                    entry: from_record(r.record)?,
                    score: r.score,
                })
            })
            .collect()
    }

    async fn list_sources(&self) -> Result<BTreeSet<String>> {
        Ok(self.db.groups(COLLECTION)?.into_iter().collect())
    }

    async fn list_documents(&self) -> Result<BTreeMap<String, SourceDocument>> {
        let mut documents: BTreeMap<String, SourceDocument> = BTreeMap::new();
        for record in self.db.export(COLLECTION)? {
            let entry = from_record(record)?;
            let document = documents.entry(entry.id.source).or_default();
            document.last_updated = document.last_updated.max(entry.last_updated);
            document.chunks.push(Chunk {
                chunk_index: entry.id.chunk_index,
                content: entry.content,
            });
        }
        for document in documents.values_mut() {
            document.chunks.sort_by_key(|c| c.chunk_index);
        }
        Ok(documents)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.db.count(COLLECTION)?)
    }

    async fn flush(&self) -> Result<()> {
        Ok(self.db.persist().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(source: &str, index: usize, embedding: &[f32], content: &str) -> IndexEntry {
        IndexEntry {
            id: ChunkId::new(source, index),
            embedding: embedding.to_vec(),
            content: content.to_string(),
            last_updated: None,
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_self_query_scores_one() {
        let index = LocalVectorIndex::in_memory(3, DistanceMetric::Cosine).await.unwrap();
        index
            .upsert(vec![
                entry("doc1", 0, &[0.2, 0.4, 0.9], "alpha"),
                entry("doc1", 1, &[0.9, 0.1, 0.0], "beta"),
            ])
            .await
            .unwrap();

        let results = index.query(&[0.2, 0.4, 0.9], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.content, "alpha");
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_entry_roundtrip_through_record() {
        let mut original = entry("notes/a_b.md", 7, &[1.0, 0.0], "text");
        original.last_updated = Some(Utc::now());
        original
            .metadata
            .insert("file_modified".to_string(), "2024-01-01T00:00:00+00:00".to_string());

        let record = to_record(original.clone());
        assert_eq!(record.id, "notes/a_b.md_7");
        assert_eq!(record.group, "notes/a_b.md");

        let restored = from_record(record).unwrap();
        assert_eq!(restored.id, original.id);
        assert_eq!(restored.metadata, original.metadata);
        assert_eq!(
            restored.last_updated.map(|t| t.timestamp_micros()),
            original.last_updated.map(|t| t.timestamp_micros())
        );
    }

    #[tokio::test]
    async fn test_delete_and_replace_source() {
        let index = LocalVectorIndex::in_memory(2, DistanceMetric::Cosine).await.unwrap();
        index
            .upsert(vec![
                entry("a", 0, &[1.0, 0.0], "a0"),
                entry("a", 1, &[0.0, 1.0], "a1"),
                entry("b", 0, &[1.0, 1.0], "b0"),
            ])
            .await
            .unwrap();

        assert_eq!(index.delete_by_source("missing").await.unwrap(), 0);
        assert_eq!(index.delete_by_source("a").await.unwrap(), 2);
        assert_eq!(
            index.list_sources().await.unwrap(),
            BTreeSet::from(["b".to_string()])
        );

        let written = index
            .replace_source("b", vec![entry("b", 0, &[0.5, 0.5], "new")])
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(index.count().await.unwrap(), 1);
        let top = index.query(&[0.5, 0.5], 5).await.unwrap();
        assert_eq!(top[0].entry.content, "new");
    }

    #[tokio::test]
    async fn test_dimension_checks() {
        let index = LocalVectorIndex::in_memory(3, DistanceMetric::Cosine).await.unwrap();

        let bad = index.upsert(vec![entry("a", 0, &[1.0, 0.0], "x")]).await;
        assert!(matches!(
            bad,
            Err(AppError::DimensionMismatch { expected: 3, actual: 2 })
        ));

        assert!(matches!(
            index.query(&[1.0], 3).await,
            Err(AppError::DimensionMismatch { .. })
        ));
        assert!(index.query(&[1.0, 0.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistent_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let index =
                LocalVectorIndex::persistent(temp_dir.path(), 2, DistanceMetric::Cosine, true)
                    .await
                    .unwrap();
            assert_eq!(index.provider_name(), "local");
            index
                .upsert(vec![entry("doc", 0, &[1.0, 0.0], "kept")])
                .await
                .unwrap();
        }

        let index = LocalVectorIndex::persistent(temp_dir.path(), 2, DistanceMetric::Cosine, true)
            .await
            .unwrap();
        let top = index.query(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(top[0].entry.content, "kept");
        assert_eq!(index.stats().unwrap().vector_count, 1);

        let wrong = LocalVectorIndex::persistent(temp_dir.path(), 3, DistanceMetric::Cosine, true)
            .await;
        assert!(matches!(
            wrong,
            Err(AppError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[tokio::test]
    async fn test_list_documents_groups_by_source() {
        let index = LocalVectorIndex::in_memory(2, DistanceMetric::Cosine).await.unwrap();
        let older = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let newer = DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let mut b0 = entry("b", 0, &[1.0, 1.0], "b0");
        b0.last_updated = Some(older);
        let mut a1 = entry("a", 1, &[0.0, 1.0], "a1");
        a1.last_updated = Some(newer);
        let mut a0 = entry("a", 0, &[1.0, 0.0], "a0");
        a0.last_updated = Some(older);
        index.upsert(vec![b0, a1, a0]).await.unwrap();

        let documents = index.list_documents().await.unwrap();
        assert_eq!(
            documents.keys().cloned().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string()]
        );

        let a = &documents["a"];
        let indices: Vec<usize> = a.chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(a.chunks[0].content, "a0");
        assert_eq!(a.last_updated, Some(newer));
        assert_eq!(documents["b"].last_updated, Some(older));

        index.clear().await.unwrap();
        assert!(index.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_index_is_not_overwritten() {
        let temp_dir = TempDir::new().unwrap();

        {
            let index =
                LocalVectorIndex::persistent(temp_dir.path(), 2, DistanceMetric::Cosine, true)
                    .await
                    .unwrap();
            index
                .upsert(vec![entry("doc", 0, &[1.0, 0.0], "kept")])
                .await
                .unwrap();
        }

        let records_path = temp_dir.path().join(COLLECTION).join("records.json");
        let data = std::fs::read(&records_path).unwrap();
        let truncated = data[..data.len() / 2].to_vec();
        std::fs::write(&records_path, &truncated).unwrap();

        for dimensions in [2, 7] {
            let reopened = LocalVectorIndex::persistent(
                temp_dir.path(),
                dimensions,
                DistanceMetric::Cosine,
                true,
            )
            .await;
            assert!(matches!(reopened, Err(AppError::Storage(_))));
        }
        assert_eq!(std::fs::read(&records_path).unwrap(), truncated);
    }
}

//! Vector Index Abstraction Layer
//!
//! The document indexer and context retriever only talk to the
//! [`VectorIndex`] trait. Backends are selected with [`VectorIndexProvider`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      VectorIndex Trait                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │ upsert │ delete_by_source │ replace_source │ query │ clear  │
//! └─────────────────────────────────────────────────────────────┘
//!                  ▲                           ▲
//!                  │                           │
//!         ┌────────┴────────┐        ┌────────┴────────┐
//!         │     Memory      │        │      Local      │
//!         │ (rag-vector,    │        │ (rag-vector,    │
//!         │  no snapshots)  │        │  JSON on disk)  │
//!         └─────────────────┘        └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_rag::db::vectorstore::{VectorIndex, VectorIndexProvider};
//!
//! let index = VectorIndexProvider::Local {
//!     path: "./data/index".into(),
//!     auto_persist: true,
//! }
//! .create_index(1536, DistanceMetric::Cosine)
//! .await?;
//!
//! index.upsert(entries).await?;
//! let results = index.query(&query_embedding, 3).await?;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rag_vector::DistanceMetric;
use serde::{Deserialize, Serialize};

use crate::types::{IndexEntry, Result, ScoredEntry, SourceDocument};

// ============================================================================
// Vector Index Provider Configuration
// ============================================================================

/// Configuration for vector index backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum VectorIndexProvider {
    /// In-memory index. Data is lost when the process exits.
    Memory,

    /// Embedded index persisted under `path`.
    Local {
        /// Data directory.
        path: PathBuf,
        /// Snapshot after every mutation instead of only on flush.
        #[serde(default = "default_auto_persist")]
        auto_persist: bool,
    },
}

fn default_auto_persist() -> bool {
    true
}

impl VectorIndexProvider {
    /// Create an index instance from this provider configuration.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if a persisted index was built with a different
    /// dimension, `Storage`/`Io` if the data directory cannot be read.
    pub async fn create_index(
        &self,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<Arc<dyn VectorIndex>> {
        match self {
            VectorIndexProvider::Memory => {
                let index = super::local::LocalVectorIndex::in_memory(dimensions, metric).await?;
                Ok(Arc::new(index))
            }
            VectorIndexProvider::Local { path, auto_persist } => {
                let index = super::local::LocalVectorIndex::persistent(
                    path.clone(),
                    dimensions,
                    metric,
                    *auto_persist,
                )
                .await?;
                Ok(Arc::new(index))
            }
        }
    }
}

// ============================================================================
// Vector Index Trait
// ============================================================================

/// Store of [`IndexEntry`] rows with nearest-neighbour search.
///
/// Every mutation is atomic with respect to concurrent queries: a reader
/// observes a batch, a source deletion or a clear either completely or not at
/// all. Writes are last-writer-wins per chunk identity.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Get the name of this index backend.
    fn provider_name(&self) -> &'static str;

    /// Dimension every stored and queried vector must have.
    fn dimensions(&self) -> usize;

    /// Insert or replace entries by chunk identity, as one atomic batch.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if any entry has the wrong dimension, in which
    /// case nothing is written.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize>;

    /// Remove every entry of `source_id`. Unknown sources remove nothing.
    ///
    /// # Returns
    ///
    /// The number of entries removed.
    async fn delete_by_source(&self, source_id: &str) -> Result<usize>;

    /// Replace all entries of `source_id` with `entries`.
    ///
    /// The default runs [`delete_by_source`](Self::delete_by_source) then
    /// [`upsert`](Self::upsert), which leaves a window where the source has no
    /// entries. Backends that can do both under one lock override this.
    async fn replace_source(&self, source_id: &str, entries: Vec<IndexEntry>) -> Result<usize> {
        self.delete_by_source(source_id).await?;
        self.upsert(entries).await
    }

    /// Remove every entry.
    async fn clear(&self) -> Result<usize>;

    /// Return up to `k` entries by descending similarity.
    ///
    /// Equal scores keep insertion order. `k == 0` yields an empty result.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `vector` has the wrong length.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>>;

    /// Distinct source identifiers currently indexed.
    async fn list_sources(&self) -> Result<BTreeSet<String>>;

    /// Every indexed source with its chunks in chunk order.
    async fn list_documents(&self) -> Result<BTreeMap<String, SourceDocument>>;

    /// Total number of entries.
    async fn count(&self) -> Result<usize>;

    /// Write any buffered state to durable storage.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

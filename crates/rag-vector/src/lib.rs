//! # rag-vector
//!
//! A pure-Rust embedded vector store built for retrieval pipelines.
//!
//! ## Features
//!
//! - **Pure Rust**: No native dependencies, compiles anywhere Rust does
//! - **Exact Search**: Brute-force scan with deterministic tie-breaking
//! - **Groups**: Every record belongs to a group (e.g. a source document) that
//!   can be deleted or replaced atomically
//! - **Persistence**: Optional JSON snapshots, written after every mutation;
//!   a snapshot that fails is retried and reported by [`VectorDb::persist`]
//! - **Distance Metrics**: Cosine and Euclidean (L2)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rag_vector::{Config, DistanceMetric, Record, VectorDb, VectorMetadata};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rag_vector::Error> {
//!     let db = VectorDb::open(Config::memory()).await?;
//!     db.create_collection("documents", 3, DistanceMetric::Cosine).await?;
//!
//!     db.upsert_batch(
//!         "documents",
//!         vec![Record::new("doc1_0", "doc1", vec![1.0, 0.0, 0.0], VectorMetadata::new())],
//!     )
//!     .await?;
//!
//!     let results = db.search("documents", &[1.0, 0.0, 0.0], 10).await?;
//!     assert_eq!(results[0].record.group, "doc1");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       VectorDb                        │
//! │  ┌──────────────────────────────────────────────────┐ │
//! │  │                   Collection                      │ │
//! │  │  ┌─────────────┐ ┌─────────────┐ ┌─────────────┐ │ │
//! │  │  │   Records   │ │ Group Index │ │  Insertion  │ │ │
//! │  │  │ (id → rec)  │ │(group → ids)│ │  Sequence   │ │ │
//! │  │  └─────────────┘ └─────────────┘ └─────────────┘ │ │
//! │  └──────────────────────────────────────────────────┘ │
//! │  ┌──────────────────────────────────────────────────┐ │
//! │  │          Persistence Layer (optional)             │ │
//! │  │     collections.json + {name}/records.json        │ │
//! │  └──────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
pub mod config;
pub mod distance;
pub mod error;
pub mod persistence;
pub mod types;

// Re-exports for convenience
pub use collection::Collection;
pub use config::Config;
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use types::{MetadataValue, Record, SearchResult, VectorId, VectorMetadata};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The main vector database instance.
///
/// `VectorDb` manages multiple collections, each containing vectors of a specific
/// dimensionality. It is cheap to clone and all clones share state.
///
/// # Thread Safety
///
/// Uses `scc::HashMap` for the collection registry, which is safe to use
/// across `.await` points. Each collection guards its records with its own
/// read/write lock; searches share the lock, mutations take it exclusively.
#[derive(Clone)]
pub struct VectorDb {
    inner: Arc<VectorDbInner>,
}

struct VectorDbInner {
    config: Config,
    /// Async-safe concurrent hashmap from scc crate
    collections: scc::HashMap<String, Arc<Collection>>,
    /// Serializes snapshot writes so files on disk never interleave.
    persist_lock: tokio::sync::Mutex<()>,
    /// Collections whose last automatic snapshot failed.
    unsaved: Mutex<BTreeSet<String>>,
}

impl VectorDb {
    /// Open or create a vector database with the given configuration.
    ///
    /// A persistent database fails to open if any listed collection cannot be
    /// loaded; nothing on disk is modified in that case.
    ///
    /// # Arguments
    ///
    /// * `config` - Database configuration (memory or persistent).
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// // In-memory database
    /// let db = VectorDb::open(Config::memory()).await?;
    ///
    /// // Persistent database
    /// let db = VectorDb::open(Config::persistent("./data/vectors")).await?;
    /// ```
    #[instrument(skip(config), fields(persistent = config.data_path.is_some()))]
    pub async fn open(config: Config) -> Result<Self> {
        info!("Opening vector database");

        let db = Self {
            inner: Arc::new(VectorDbInner {
                config: config.clone(),
                collections: scc::HashMap::new(),
                persist_lock: tokio::sync::Mutex::new(()),
                unsaved: Mutex::new(BTreeSet::new()),
            }),
        };

        if let Some(ref path) = config.data_path {
            db.load_collections(path).await?;
        }

        Ok(db)
    }

    /// Create a new collection with the specified parameters.
    ///
    /// # Arguments
    ///
    /// * `name` - Unique name for the collection.
    /// * `dimensions` - Dimensionality of vectors (e.g., 1536 for ada-002).
    /// * `metric` - Distance metric to use for similarity calculations.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection with the same name already exists.
    #[instrument(skip(self))]
    pub async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<Arc<Collection>> {
        info!(name, dimensions, ?metric, "Creating collection");

        if self.inner.collections.contains(name) {
            return Err(Error::CollectionExists(name.to_string()));
        }

        let collection = Arc::new(Collection::new(name.to_string(), dimensions, metric)?);

        // Insert returns Err if key already exists (handles race condition)
        if self
            .inner
            .collections
            .insert(name.to_string(), collection.clone())
            .is_err()
        {
            return Err(Error::CollectionExists(name.to_string()));
        }

        if let Some(ref path) = self.inner.config.data_path {
            let _guard = self.inner.persist_lock.lock().await;
            persistence::save_collection(path, &collection).await?;
            self.persist_collection_list(path).await?;
        }

        Ok(collection)
    }

    /// Delete a collection and all its data.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection doesn't exist.
    #[instrument(skip(self))]
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        info!(name, "Deleting collection");

        if self.inner.collections.remove(name).is_none() {
            return Err(Error::CollectionNotFound(name.to_string()));
        }

        if let Some(ref path) = self.inner.config.data_path {
            let _guard = self.inner.persist_lock.lock().await;
            persistence::delete_collection(path, name).await?;
            self.persist_collection_list(path).await?;
        }

        Ok(())
    }

    /// Check if a collection exists.
    pub fn collection_exists(&self, name: &str) -> bool {
        self.inner.collections.contains(name)
    }

    /// List all collection names, sorted.
    pub fn list_collections(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.inner.collections.scan(|k, _| {
            names.push(k.clone());
        });
        names.sort();
        names
    }

    /// Get a reference to a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection doesn't exist.
    pub fn get_collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.inner
            .collections
            .read(name, |_, v| v.clone())
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// Insert or replace a batch of records.
    ///
    /// The batch is validated in full before anything is written. Once it is
    /// applied the call succeeds; see [`VectorDb::persist`] for how a failed
    /// automatic snapshot is reported.
    ///
    /// # Returns
    ///
    /// The number of distinct records written.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn upsert_batch(&self, collection: &str, records: Vec<Record>) -> Result<usize> {
        let col = self.get_collection(collection)?;
        let count = col.upsert_batch(records)?;
        debug!(count, "Upserted batch");
        self.after_write(&col).await;
        Ok(count)
    }

    /// Delete a single record.
    ///
    /// # Returns
    ///
    /// `true` if the record was found and deleted, `false` if it didn't exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let col = self.get_collection(collection)?;
        let deleted = col.delete(id);
        if deleted {
            self.after_write(&col).await;
        }
        Ok(deleted)
    }

    /// Delete every record belonging to `group`.
    ///
    /// # Returns
    ///
    /// The number of records deleted; an unknown group deletes nothing.
    #[instrument(skip(self))]
    pub async fn delete_group(&self, collection: &str, group: &str) -> Result<usize> {
        let col = self.get_collection(collection)?;
        let removed = col.delete_group(group);
        debug!(removed, "Deleted group");
        if removed > 0 {
            self.after_write(&col).await;
        }
        Ok(removed)
    }

    /// Atomically replace the contents of `group` with `records`.
    ///
    /// # Returns
    ///
    /// `(removed, inserted)` record counts.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn replace_group(
        &self,
        collection: &str,
        group: &str,
        records: Vec<Record>,
    ) -> Result<(usize, usize)> {
        let col = self.get_collection(collection)?;
        let counts = col.replace_group(group, records)?;
        debug!(removed = counts.0, inserted = counts.1, "Replaced group");
        self.after_write(&col).await;
        Ok(counts)
    }

    /// Remove every record from a collection, keeping the collection itself.
    #[instrument(skip(self))]
    pub async fn clear(&self, collection: &str) -> Result<usize> {
        let col = self.get_collection(collection)?;
        let removed = col.clear();
        info!(removed, "Cleared collection");
        self.after_write(&col).await;
        Ok(removed)
    }

    /// Search for similar vectors.
    ///
    /// # Arguments
    ///
    /// * `collection` - Name of the collection to search.
    /// * `query` - Query vector to find similar vectors to.
    /// * `limit` - Maximum number of results to return.
    ///
    /// # Returns
    ///
    /// A vector of search results, sorted by similarity (best first).
    #[instrument(skip(self, query), fields(dim = query.len()))]
    pub async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let col = self.get_collection(collection)?;
        let results = col.search(query, limit)?;
        debug!(count = results.len(), "Search completed");
        Ok(results)
    }

    /// Get a record by ID.
    pub fn get(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        let col = self.get_collection(collection)?;
        Ok(col.get(id))
    }

    /// Check if a record exists.
    pub fn contains(&self, collection: &str, id: &str) -> Result<bool> {
        let col = self.get_collection(collection)?;
        Ok(col.contains(id))
    }

    /// Get the number of records in a collection.
    pub fn count(&self, collection: &str) -> Result<usize> {
        let col = self.get_collection(collection)?;
        Ok(col.len())
    }

    /// List the groups present in a collection, sorted.
    pub fn groups(&self, collection: &str) -> Result<Vec<String>> {
        let col = self.get_collection(collection)?;
        Ok(col.groups())
    }

    /// Every record in a collection, in insertion order.
    pub fn export(&self, collection: &str) -> Result<Vec<Record>> {
        let col = self.get_collection(collection)?;
        Ok(col.export_all())
    }

    /// Get collection statistics.
    pub fn collection_stats(&self, collection: &str) -> Result<CollectionStats> {
        let col = self.get_collection(collection)?;
        Ok(col.stats())
    }

    /// Persist the current state to disk.
    ///
    /// This is only relevant for persistent databases. For in-memory databases,
    /// this is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the write error if any collection cannot be saved. Collections
    /// left unsaved by a failed automatic snapshot stay flagged until a
    /// snapshot succeeds.
    #[instrument(skip(self))]
    pub async fn persist(&self) -> Result<()> {
        let Some(ref path) = self.inner.config.data_path else {
            debug!("Skipping persist for in-memory database");
            return Ok(());
        };

        info!("Persisting database to disk");

        let mut to_persist: Vec<Arc<Collection>> = Vec::new();
        self.inner.collections.scan(|_, collection| {
            to_persist.push(collection.clone());
        });

        let _guard = self.inner.persist_lock.lock().await;
        for collection in to_persist {
            persistence::save_collection(path, &collection).await?;
            self.inner.unsaved.lock().remove(collection.name());
        }
        self.persist_collection_list(path).await?;

        Ok(())
    }

    /// Names of collections whose in-memory state is ahead of the last
    /// successful automatic snapshot.
    pub fn unsaved_collections(&self) -> Vec<String> {
        self.inner.unsaved.lock().iter().cloned().collect()
    }

    // The mutation is already visible to readers when this runs, so a failed
    // snapshot is recorded instead of returned.
    async fn after_write(&self, collection: &Collection) {
        if !self.inner.config.auto_persist {
            return;
        }
        let Some(ref path) = self.inner.config.data_path else {
            return;
        };

        // The snapshot is taken after the lock is acquired, so the last
        // writer to get here always leaves the newest state on disk.
        let _guard = self.inner.persist_lock.lock().await;
        match persistence::save_collection(path, collection).await {
            Ok(()) => {
                self.inner.unsaved.lock().remove(collection.name());
            }
            Err(e) => {
                warn!(
                    name = collection.name(),
                    error = %e,
                    "Snapshot failed, will retry on persist"
                );
                self.inner.unsaved.lock().insert(collection.name().to_string());
            }
        }
    }

    async fn load_collections(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            tokio::fs::create_dir_all(path).await?;
            return Ok(());
        }

        let list_path = path.join("collections.json");
        if !list_path.exists() {
            return Ok(());
        }

        let data = tokio::fs::read_to_string(&list_path).await?;
        let collection_names: Vec<String> = serde_json::from_str(&data)
            .map_err(|e| Error::Persistence(format!("Failed to parse collections.json: {}", e)))?;

        for name in collection_names {
            let collection = persistence::load_collection(path, &name)
                .await
                .map_err(|e| {
                    Error::Persistence(format!("Failed to load collection '{}': {}", name, e))
                })?;
            let _ = self.inner.collections.insert(name.clone(), Arc::new(collection));
            info!(name, "Loaded collection");
        }

        Ok(())
    }

    async fn persist_collection_list(&self, base_path: &Path) -> Result<()> {
        let collections = self.list_collections();
        let data = serde_json::to_vec_pretty(&collections)
            .map_err(|e| Error::Persistence(format!("Failed to serialize collections: {}", e)))?;
        persistence::write_atomic(&base_path.join("collections.json"), &data).await
    }
}

/// Statistics about a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Name of the collection.
    pub name: String,
    /// Number of vectors in the collection.
    pub vector_count: usize,
    /// Number of distinct groups.
    pub group_count: usize,
    /// Dimensionality of vectors.
    pub dimensions: usize,
    /// Distance metric used.
    pub metric: DistanceMetric,
    /// Approximate memory used by vector data, in bytes.
    pub memory_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, group: &str, vector: &[f32]) -> Record {
        Record::new(id, group, vector.to_vec(), VectorMetadata::new())
    }

    #[tokio::test]
    async fn test_create_and_search() {
        let db = VectorDb::open(Config::memory()).await.unwrap();

        db.create_collection("test", 3, DistanceMetric::Cosine)
            .await
            .unwrap();

        db.upsert_batch(
            "test",
            vec![
                record("vec1", "a", &[1.0, 0.0, 0.0]),
                record("vec2", "a", &[0.0, 1.0, 0.0]),
                record("vec3", "b", &[0.9, 0.1, 0.0]),
            ],
        )
        .await
        .unwrap();

        let results = db.search("test", &[1.0, 0.0, 0.0], 10).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].record.id, "vec1");
        assert_eq!(results[1].record.id, "vec3");
    }

    #[tokio::test]
    async fn test_collection_lifecycle() {
        let db = VectorDb::open(Config::memory()).await.unwrap();

        assert!(!db.collection_exists("test"));

        db.create_collection("test", 128, DistanceMetric::Euclidean)
            .await
            .unwrap();
        assert!(db.collection_exists("test"));
        assert_eq!(db.list_collections(), vec!["test".to_string()]);

        db.delete_collection("test").await.unwrap();
        assert!(!db.collection_exists("test"));
        assert!(matches!(
            db.count("test"),
            Err(Error::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_collection_error() {
        let db = VectorDb::open(Config::memory()).await.unwrap();

        db.create_collection("test", 128, DistanceMetric::Cosine)
            .await
            .unwrap();

        let result = db
            .create_collection("test", 128, DistanceMetric::Cosine)
            .await;
        assert!(matches!(result, Err(Error::CollectionExists(_))));
    }

    #[tokio::test]
    async fn test_reopen_restores_records() {
        let temp_dir = TempDir::new().unwrap();

        {
            let db = VectorDb::open(Config::persistent(temp_dir.path()))
                .await
                .unwrap();
            db.create_collection("docs", 2, DistanceMetric::Cosine)
                .await
                .unwrap();
            db.upsert_batch(
                "docs",
                vec![record("a_0", "a", &[1.0, 0.0]), record("b_0", "b", &[0.0, 1.0])],
            )
            .await
            .unwrap();
            db.delete_group("docs", "b").await.unwrap();
        }

        let db = VectorDb::open(Config::persistent(temp_dir.path()))
            .await
            .unwrap();
        assert!(db.collection_exists("docs"));
        assert_eq!(db.count("docs").unwrap(), 1);
        assert_eq!(db.groups("docs").unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_fails_open() {
        let temp_dir = TempDir::new().unwrap();

        {
            let db = VectorDb::open(Config::persistent(temp_dir.path()))
                .await
                .unwrap();
            db.create_collection("docs", 2, DistanceMetric::Cosine)
                .await
                .unwrap();
            db.upsert_batch("docs", vec![record("a_0", "a", &[1.0, 0.0])])
                .await
                .unwrap();
        }

        let records_path = temp_dir.path().join("docs").join("records.json");
        let data = std::fs::read(&records_path).unwrap();
        let truncated = &data[..data.len() / 2];
        std::fs::write(&records_path, truncated).unwrap();

        let result = VectorDb::open(Config::persistent(temp_dir.path())).await;
        assert!(matches!(result, Err(Error::Persistence(_))));
        assert_eq!(std::fs::read(&records_path).unwrap(), truncated);
    }

    #[tokio::test]
    async fn test_failed_snapshot_is_deferred_to_persist() {
        let temp_dir = TempDir::new().unwrap();
        let db = VectorDb::open(Config::persistent(temp_dir.path()))
            .await
            .unwrap();
        db.create_collection("docs", 2, DistanceMetric::Cosine)
            .await
            .unwrap();

        // A directory in place of the temp file makes every snapshot fail.
        let blocker = temp_dir.path().join("docs").join("records.json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        let written = db
            .upsert_batch("docs", vec![record("a_0", "a", &[1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(db.count("docs").unwrap(), 1);
        assert_eq!(db.unsaved_collections(), vec!["docs".to_string()]);
        assert!(db.persist().await.is_err());

        std::fs::remove_dir(&blocker).unwrap();
        db.persist().await.unwrap();
        assert!(db.unsaved_collections().is_empty());

        let reopened = VectorDb::open(Config::persistent(temp_dir.path()))
            .await
            .unwrap();
        assert_eq!(reopened.count("docs").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_manual_persist_without_auto_persist() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::persistent(temp_dir.path()).with_auto_persist(false);

        {
            let db = VectorDb::open(config.clone()).await.unwrap();
            db.create_collection("docs", 2, DistanceMetric::Cosine)
                .await
                .unwrap();
            db.upsert_batch("docs", vec![record("a_0", "a", &[1.0, 0.0])])
                .await
                .unwrap();
        }

        // Not flushed: the collection exists but is empty on disk.
        {
            let db = VectorDb::open(config.clone()).await.unwrap();
            assert_eq!(db.count("docs").unwrap(), 0);
            db.upsert_batch("docs", vec![record("a_0", "a", &[1.0, 0.0])])
                .await
                .unwrap();
            db.persist().await.unwrap();
        }

        let db = VectorDb::open(config).await.unwrap();
        assert_eq!(db.count("docs").unwrap(), 1);
    }
}

//! Persistence layer for rag-vector.
//!
//! Each collection lives in its own directory:
//!
//! - `{base_path}/{name}/metadata.json` - Collection metadata
//! - `{base_path}/{name}/records.json` - Records in insertion order
//!
//! Files are written to a temporary sibling first and renamed into place, so a
//! crash mid-write leaves the previous snapshot intact.

use crate::collection::Collection;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::types::Record;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Collection metadata stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionMetadata {
    name: String,
    dimensions: usize,
    metric: String,
}

/// Save a collection to disk.
pub async fn save_collection(base_path: &Path, collection: &Collection) -> Result<()> {
    let collection_path = base_path.join(collection.name());
    tokio::fs::create_dir_all(&collection_path).await?;

    let metadata = CollectionMetadata {
        name: collection.name().to_string(),
        dimensions: collection.dimensions(),
        metric: collection.metric().name().to_string(),
    };
    let metadata_json = serde_json::to_vec_pretty(&metadata)
        .map_err(|e| Error::Persistence(format!("Failed to serialize metadata: {}", e)))?;
    write_atomic(&collection_path.join("metadata.json"), &metadata_json).await?;

    // Snapshot under the collection's read lock, then write without holding it.
    let records = collection.export_all();
    let records_json = serde_json::to_vec(&records)
        .map_err(|e| Error::Persistence(format!("Failed to serialize records: {}", e)))?;
    write_atomic(&collection_path.join("records.json"), &records_json).await?;

    debug!(
        name = collection.name(),
        count = records.len(),
        path = ?collection_path,
        "Saved collection"
    );
    Ok(())
}

/// Load a collection from disk.
///
/// Records that no longer validate against the stored metadata are skipped
/// with a warning.
pub async fn load_collection(base_path: &Path, name: &str) -> Result<Collection> {
    let collection_path = base_path.join(name);

    if !collection_path.exists() {
        return Err(Error::CollectionNotFound(name.to_string()));
    }

    let metadata_json = tokio::fs::read_to_string(collection_path.join("metadata.json")).await?;
    let metadata: CollectionMetadata = serde_json::from_str(&metadata_json)
        .map_err(|e| Error::Persistence(format!("Failed to parse metadata: {}", e)))?;

    let metric: DistanceMetric = metadata.metric.parse().map_err(Error::Persistence)?;

    let collection = Collection::new(metadata.name.clone(), metadata.dimensions, metric)?;

    let records_path = collection_path.join("records.json");
    if records_path.exists() {
        let records_json = tokio::fs::read(&records_path).await?;
        let records: Vec<Record> = serde_json::from_slice(&records_json)
            .map_err(|e| Error::Persistence(format!("Failed to parse records: {}", e)))?;

        let valid: Vec<Record> = records
            .into_iter()
            .filter(|r| match collection.validate_vector(&r.vector) {
                Ok(()) => true,
                Err(e) => {
                    warn!(id = %r.id, error = %e, "Failed to load record, skipping");
                    false
                }
            })
            .collect();

        let count = collection.upsert_batch(valid)?;
        debug!(name, count, "Loaded records");
    }

    info!(name, dimensions = metadata.dimensions, "Loaded collection");
    Ok(collection)
}

/// Remove a collection's directory.
pub async fn delete_collection(base_path: &Path, name: &str) -> Result<()> {
    let collection_path = base_path.join(name);
    if collection_path.exists() {
        tokio::fs::remove_dir_all(&collection_path).await?;
    }
    Ok(())
}

/// Write `data` to `path` via a temporary file and rename.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

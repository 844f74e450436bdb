//! Vector collection.
//!
//! A collection is a named container for vectors with a specific dimensionality
//! and distance metric. Search is an exact scan, so scores and ordering are
//! fully deterministic: results are ranked by descending score and ties go to
//! the record that was written first.

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::types::{Record, SearchResult, VectorId};
use crate::CollectionStats;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::trace;

/// A named collection of vectors.
///
/// Every mutation takes the collection's write lock once and is applied in
/// full before the lock is released, so readers never observe a partially
/// applied batch.
pub struct Collection {
    /// Collection name.
    name: String,
    /// Vector dimensions.
    dimensions: usize,
    /// Distance metric.
    metric: DistanceMetric,
    /// Records, group index and insertion counter.
    state: RwLock<CollectionState>,
}

#[derive(Default)]
struct CollectionState {
    records: HashMap<VectorId, StoredRecord>,
    groups: BTreeMap<String, BTreeSet<VectorId>>,
    next_seq: u64,
}

struct StoredRecord {
    record: Record,
    /// Insertion sequence; a replaced record gets a fresh one.
    seq: u64,
}

impl CollectionState {
    fn insert(&mut self, record: Record) {
        if let Some(old) = self.records.remove(&record.id) {
            self.unlink(&old.record.group, &old.record.id);
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.groups
            .entry(record.group.clone())
            .or_default()
            .insert(record.id.clone());
        self.records.insert(record.id.clone(), StoredRecord { record, seq });
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.records.remove(id) {
            Some(old) => {
                self.unlink(&old.record.group, id);
                true
            }
            None => false,
        }
    }

    fn remove_group(&mut self, group: &str) -> usize {
        let Some(ids) = self.groups.remove(group) else {
            return 0;
        };
        for id in &ids {
            self.records.remove(id);
        }
        ids.len()
    }

    fn unlink(&mut self, group: &str, id: &str) {
        if let Some(ids) = self.groups.get_mut(group) {
            ids.remove(id);
            if ids.is_empty() {
                self.groups.remove(group);
            }
        }
    }
}

type Scored<'a> = (f32, u64, &'a Record);

fn distinct_ids(records: &[Record]) -> usize {
    records.iter().map(|r| r.id.as_str()).collect::<HashSet<_>>().len()
}

fn rank(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1))
}

impl Collection {
    /// Create a new, empty collection.
    ///
    /// # Errors
    ///
    /// Returns an error if `dimensions` is zero.
    pub fn new(name: String, dimensions: usize, metric: DistanceMetric) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::Configuration("Dimensions must be > 0".to_string()));
        }

        Ok(Self {
            name,
            dimensions,
            metric,
            state: RwLock::new(CollectionState::default()),
        })
    }

    /// Get the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the vector dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Get the number of vectors in the collection.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check a vector against the collection's dimensions.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        if vector.iter().any(|v| v.is_nan() || v.is_infinite()) {
            return Err(Error::InvalidVector(
                "Vector contains NaN or Inf".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_record(&self, record: &Record) -> Result<()> {
        if record.id.is_empty() {
            return Err(Error::InvalidRecord("Record ID must not be empty".to_string()));
        }
        self.validate_vector(&record.vector)
    }

    /// Insert or replace records as one batch.
    ///
    /// Every record is validated before any of them is applied; a single
    /// invalid record rejects the whole batch.
    ///
    /// # Returns
    ///
    /// The number of distinct records written; a repeated id counts once.
    pub fn upsert_batch(&self, records: Vec<Record>) -> Result<usize> {
        for record in &records {
            self.validate_record(record)?;
        }

        let count = distinct_ids(&records);
        let mut state = self.state.write();
        for record in records {
            state.insert(record);
        }

        trace!(collection = %self.name, count, "Upserted batch");
        Ok(count)
    }

    /// Delete a single record.
    ///
    /// # Returns
    ///
    /// `true` if the record existed.
    pub fn delete(&self, id: &str) -> bool {
        self.state.write().remove(id)
    }

    /// Delete every record in `group`.
    ///
    /// # Returns
    ///
    /// The number of records removed (zero for an unknown group).
    pub fn delete_group(&self, group: &str) -> usize {
        let removed = self.state.write().remove_group(group);
        trace!(collection = %self.name, group, removed, "Deleted group");
        removed
    }

    /// Replace the entire contents of `group` with `records`.
    ///
    /// The delete and the insert happen under one write lock, so readers see
    /// either the old group or the new one.
    ///
    /// # Errors
    ///
    /// Fails without changing anything if a record is invalid or belongs to a
    /// different group.
    ///
    /// # Returns
    ///
    /// `(removed, inserted)` record counts.
    pub fn replace_group(&self, group: &str, records: Vec<Record>) -> Result<(usize, usize)> {
        for record in &records {
            if record.group != group {
                return Err(Error::InvalidRecord(format!(
                    "Record '{}' belongs to group '{}', expected '{}'",
                    record.id, record.group, group
                )));
            }
            self.validate_record(record)?;
        }

        let inserted = distinct_ids(&records);
        let mut state = self.state.write();
        let removed = state.remove_group(group);
        for record in records {
            state.insert(record);
        }

        Ok((removed, inserted))
    }

    /// Remove every record.
    ///
    /// # Returns
    ///
    /// The number of records removed.
    pub fn clear(&self) -> usize {
        let mut state = self.state.write();
        let removed = state.records.len();
        state.records.clear();
        state.groups.clear();
        removed
    }

    /// Get a record by ID.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.state.read().records.get(id).map(|s| s.record.clone())
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &str) -> bool {
        self.state.read().records.contains_key(id)
    }

    /// List group keys in sorted order.
    pub fn groups(&self) -> Vec<String> {
        self.state.read().groups.keys().cloned().collect()
    }

    /// Number of records in `group`.
    pub fn group_len(&self, group: &str) -> usize {
        self.state
            .read()
            .groups
            .get(group)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    /// Search for the `limit` most similar records.
    ///
    /// Results are sorted by descending score; equal scores keep insertion
    /// order. A `limit` of zero yields no results.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the query has the wrong length.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.validate_vector(query)?;

        if limit == 0 {
            return Ok(Vec::new());
        }

        let state = self.state.read();
        let mut scored: Vec<Scored<'_>> = state
            .records
            .values()
            .map(|s| (self.metric.similarity(query, &s.record.vector), s.seq, &s.record))
            .collect();

        if limit < scored.len() {
            scored.select_nth_unstable_by(limit - 1, rank);
            scored.truncate(limit);
        }
        scored.sort_by(rank);

        Ok(scored
            .into_iter()
            .map(|(score, _, record)| SearchResult {
                record: record.clone(),
                score,
            })
            .collect())
    }

    /// Get collection statistics.
    pub fn stats(&self) -> CollectionStats {
        let state = self.state.read();
        let vector_count = state.records.len();
        CollectionStats {
            name: self.name.clone(),
            vector_count,
            group_count: state.groups.len(),
            dimensions: self.dimensions,
            metric: self.metric,
            memory_bytes: vector_count * self.dimensions * std::mem::size_of::<f32>(),
        }
    }

    /// Export all records in insertion order.
    pub fn export_all(&self) -> Vec<Record> {
        let state = self.state.read();
        let mut stored: Vec<&StoredRecord> = state.records.values().collect();
        stored.sort_by_key(|s| s.seq);
        stored.into_iter().map(|s| s.record.clone()).collect()
    }
}

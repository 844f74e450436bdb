//! Embedding Cache for RAG Pipeline
//!
//! Re-ingesting a document whose chunks did not change, or repeating a query,
//! should not cost another round-trip to the embedding service. This module
//! wraps any [`EmbeddingProvider`] in an in-memory LRU cache.
//!
//! # Cache Key Strategy
//!
//! Keys are SHA-256 hashes of `model_name + "\0" + text`, so vectors from
//! different models never collide.
//!
//! # Example
//!
//! ```ignore
//! use std::num::NonZeroUsize;
//! use mcp_rag::rag::cache::CachedEmbeddings;
//!
//! let cached = CachedEmbeddings::new(provider, NonZeroUsize::new(1024).unwrap());
//! let first = cached.embed("hello world").await?;   // miss, calls provider
//! let second = cached.embed("hello world").await?;  // hit
//! assert_eq!(cached.stats().hits, 1);
//! ```

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::rag::embeddings::EmbeddingProvider;
use crate::types::{AppError, Result};

// ============================================================================
// Cache Types
// ============================================================================

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries in cache
    pub entry_count: usize,
    /// Maximum number of entries
    pub capacity: usize,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

// ============================================================================
// Caching Provider
// ============================================================================

/// An [`EmbeddingProvider`] that serves repeated texts from an LRU cache and
/// forwards only the misses to the wrapped provider.
pub struct CachedEmbeddings {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEmbeddings {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Compute the cache key for `text` under the wrapped provider's model.
    pub fn compute_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.inner.model_name().as_bytes());
        hasher.update(b"\0");
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: cache.len(),
            capacity: cache.cap().get(),
        }
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddings {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| self.compute_key(t)).collect();

        let mut results: Vec<Option<Vec<f32>>> = {
            let mut cache = self.cache.lock();
            keys.iter().map(|k| cache.get(k).cloned()).collect()
        };

        let missing: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.is_none().then_some(i))
            .collect();

        self.hits
            .fetch_add((texts.len() - missing.len()) as u64, Ordering::Relaxed);
        self.misses
            .fetch_add(missing.len() as u64, Ordering::Relaxed);
        trace!(hits = texts.len() - missing.len(), misses = missing.len(), "Embedding cache lookup");

        if !missing.is_empty() {
            let to_embed: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed_many(&to_embed).await?;
            if fresh.len() != to_embed.len() {
                return Err(AppError::Internal(format!(
                    "provider returned {} embeddings for {} inputs",
                    fresh.len(),
                    to_embed.len()
                )));
            }

            let mut cache = self.cache.lock();
            for (&i, vector) in missing.iter().zip(fresh) {
                cache.put(keys[i].clone(), vector.clone());
                results[i] = Some(vector);
            }
        }

        results
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| AppError::Internal("embedding cache lost a result".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Returns `[len, 1.0]` for each text and counts every text it sees.
    struct CountingProvider {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.seen.fetch_add(texts.len(), Ordering::SeqCst);
            if texts.iter().any(|t| t.is_empty()) {
                return Err(AppError::InvalidInput("empty".into()));
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn cached(capacity: usize) -> (Arc<CountingProvider>, CachedEmbeddings) {
        let inner = Arc::new(CountingProvider {
            seen: AtomicUsize::new(0),
        });
        let cache = CachedEmbeddings::new(inner.clone(), NonZeroUsize::new(capacity).unwrap());
        (inner, cache)
    }

    #[test]
    fn test_cache_key_computation() {
        let (_, cache) = cached(4);
        let k1 = cache.compute_key("hello");
        let k2 = cache.compute_key("hello");
        let k3 = cache.compute_key("world");

        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
        assert_eq!(k1.len(), 64);
    }

    #[tokio::test]
    async fn test_only_misses_reach_provider() {
        let (inner, cache) = cached(16);

        let first = cache
            .embed_many(&["a".to_string(), "bb".to_string()])
            .await
            .unwrap();
        assert_eq!(inner.seen.load(Ordering::SeqCst), 2);

        let second = cache
            .embed_many(&["bb".to_string(), "ccc".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(inner.seen.load(Ordering::SeqCst), 3);

        assert_eq!(second, vec![first[1].clone(), vec![3.0, 1.0], first[0].clone()]);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.entry_count, 3);
        assert!((stats.hit_rate() - 40.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let (inner, cache) = cached(2);

        cache.embed("a").await.unwrap();
        cache.embed("b").await.unwrap();
        cache.embed("c").await.unwrap();
        assert_eq!(cache.stats().entry_count, 2);

        // "a" was evicted, so it goes back to the provider.
        cache.embed("a").await.unwrap();
        assert_eq!(inner.seen.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let (inner, cache) = cached(4);

        let result = cache.embed_many(&["ok".to_string(), String::new()]).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(cache.stats().entry_count, 0);

        cache.embed("ok").await.unwrap();
        assert_eq!(inner.seen.load(Ordering::SeqCst), 3);

        cache.clear();
        assert_eq!(cache.stats().entry_count, 0);
    }
}

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use tokio::sync::RwLock;

/// Compute SHA256 hash of content
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// In-memory LRU cache of embeddings, keyed by model and text hash
pub struct EmbeddingCache {
    entries: RwLock<LruCache<String, Vec<f32>>>,
    model: String,
    stats: RwLock<CacheStats>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl EmbeddingCache {
    pub fn new(model: impl Into<String>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            model: model.into(),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    fn key(&self, content: &str) -> String {
        hash_content(&format!("{}\n{}", self.model, content))
    }

    pub async fn get(&self, content: &str) -> Option<Vec<f32>> {
        let key = self.key(content);
        let hit = self.entries.write().await.get(&key).cloned();

        let mut stats = self.stats.write().await;
        if hit.is_some() {
            stats.hits += 1;
            tracing::debug!("Embedding cache hit: {}", &key[..8]);
        } else {
            stats.misses += 1;
            tracing::debug!("Embedding cache miss: {}", &key[..8]);
        }
        hit
    }

    pub async fn put(&self, content: &str, vector: Vec<f32>) {
        let key = self.key(content);
        self.entries.write().await.put(key, vector);
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::cache::EmbeddingCache;

/// Embedder trait for converting text to vectors
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    /// One vector per input, in input order
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;
}

/// OpenAI-compatible embedding client (`/v1/embeddings`)
pub struct OpenAIEmbedder {
    client: Client,
    base_url: String,
    dimensions: usize,
    model: String,
    cache: Option<Arc<EmbeddingCache>>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [&'a str],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    pub fn new(
        base_url: String,
        model: String,
        dimensions: usize,
        insecure_skip_verify: bool,
    ) -> Result<Self> {
        let client = if insecure_skip_verify {
            reqwest::Client::builder()
                .danger_accept_invalid_certs(true)
                .build()?
        } else {
            reqwest::Client::new()
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimensions,
            model,
            cache: None,
        })
    }

    /// Enable caching with specified cache instance
    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Call the embedding endpoint (bypassing cache)
    async fn embed_uncached(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .context("Failed to call embedding service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding service returned status {}: {}", status, body);
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        order_embeddings(embedding_response.data, texts.len(), self.dimensions)
    }
}

/// Put response vectors back in input order and check their shape
fn order_embeddings(
    data: Vec<EmbeddingData>,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        anyhow::bail!("Expected {} embeddings, got {}", expected, data.len());
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, item) in data.into_iter().enumerate() {
        let index = item.index.unwrap_or(position);
        if item.embedding.len() != dimensions {
            anyhow::bail!(
                "Expected embedding dimension {}, got {}",
                dimensions,
                item.embedding.len()
            );
        }
        let slot = slots
            .get_mut(index)
            .filter(|slot| slot.is_none())
            .with_context(|| format!("Embedding index {} out of range or repeated", index))?;
        *slot = Some(item.embedding);
    }

    slots
        .into_iter()
        .map(|slot| slot.context("Embedding missing from response"))
        .collect()
}

#[async_trait::async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().context("No embedding data in response")
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

        // Check cache first if enabled
        if let Some(cache) = &self.cache {
            for (slot, text) in vectors.iter_mut().zip(texts) {
                *slot = cache.get(text).await;
            }
        }

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| vectors[i].is_none()).collect();
        if !missing.is_empty() {
            let batch: Vec<&str> = missing.iter().map(|&i| texts[i]).collect();
            let fresh = self.embed_uncached(&batch).await?;

            for (&i, vector) in missing.iter().zip(fresh) {
                if let Some(cache) = &self.cache {
                    cache.put(texts[i], vector.clone()).await;
                }
                vectors[i] = Some(vector);
            }
        }

        vectors
            .into_iter()
            .map(|v| v.context("Embedding missing for input"))
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Deterministic, network-free embedder.
///
/// Lowercased alphanumeric tokens are hashed into buckets and the result is
/// L2-normalised, so texts sharing words land close together.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            vector[idx] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait::async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

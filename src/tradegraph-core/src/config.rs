use serde::{Deserialize, Serialize};

use crate::store::ResolutionMode;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Which store backs the server: "dgraph" or "memory"
    #[serde(default = "default_store")]
    pub store: String,
    pub dgraph_url: String,
    pub port: String,
    #[serde(default)]
    pub insecure_skip_verify: bool,

    pub embedding_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    #[serde(default = "default_cache_capacity")]
    pub embedding_cache_capacity: usize,

    #[serde(default)]
    pub resolution: ResolutionMode,

    /// Results returned by text search when the request sets no limit
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default)]
    pub features: Features,

    // CORS configuration
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Features {
    /// Call the remote embedding service; otherwise embed locally by hashing
    #[serde(default)]
    pub embedding: bool,
    #[serde(default)]
    pub embedding_cache: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_enabled")]
    pub enabled: bool,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_store() -> String {
    "dgraph".to_string()
}

fn default_embedding_model() -> String {
    "default".to_string()
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_search_top_k() -> usize {
    5
}

fn default_cors_enabled() -> bool {
    true
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: default_cors_enabled(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.store.eq_ignore_ascii_case("memory")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: default_store(),
            dgraph_url: "http://localhost:8080".to_string(),
            port: "8686".to_string(),
            insecure_skip_verify: false,
            embedding_url: "http://localhost:1234".to_string(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: 384,
            embedding_cache_capacity: default_cache_capacity(),
            resolution: ResolutionMode::default(),
            search_top_k: default_search_top_k(),
            features: Features::default(),
            cors: CorsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "dgraph_url": "http://dgraph:8080",
                "port": "9000",
                "embedding_url": "http://embed:1234",
                "embedding_dimensions": 768
            }"#,
        )
        .unwrap();

        assert_eq!(config.store, "dgraph");
        assert!(!config.uses_memory_store());
        assert_eq!(config.embedding_model, "default");
        assert_eq!(config.search_top_k, 5);
        assert_eq!(config.resolution, ResolutionMode::Unguarded);
        assert!(!config.features.embedding);
        assert!(config.cors.enabled);
    }

    #[test]
    fn test_serialized_resolution_and_memory_store() {
        let config: Config = serde_json::from_str(
            r#"{
                "store": "Memory",
                "dgraph_url": "",
                "port": "9000",
                "embedding_url": "",
                "embedding_dimensions": 64,
                "resolution": "serialized",
                "features": {"embedding": true}
            }"#,
        )
        .unwrap();

        assert!(config.uses_memory_store());
        assert_eq!(config.resolution, ResolutionMode::SerializedPerKey);
        assert!(config.features.embedding);
        assert!(!config.features.embedding_cache);
    }
}

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::connection::{validate_predicate, GraphConnection, Selection};
use crate::error::{GraphError, Result};

/// Nearest-neighbour search over nodes carrying an embedding predicate.
///
/// Ranking is delegated to the store's vector index; results come back most
/// similar first and ties keep whatever order the store produced.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimilaritySearcher;

impl SimilaritySearcher {
    pub fn new() -> Self {
        Self
    }

    /// Retrieve up to `top_k` nodes and deserialize each into `T`
    pub async fn search<T: DeserializeOwned>(
        &self,
        conn: &dyn GraphConnection,
        query_vector: &[f32],
        embedding_predicate: &str,
        selection: &Selection,
        top_k: usize,
    ) -> Result<Vec<T>> {
        let nodes = self
            .search_nodes(conn, query_vector, embedding_predicate, selection, top_k)
            .await?;

        nodes
            .into_iter()
            .map(|node| serde_json::from_value(node).map_err(GraphError::from))
            .collect()
    }

    /// Same as [`search`](Self::search) without deserializing
    pub async fn search_nodes(
        &self,
        conn: &dyn GraphConnection,
        query_vector: &[f32],
        embedding_predicate: &str,
        selection: &Selection,
        top_k: usize,
    ) -> Result<Vec<Value>> {
        if top_k == 0 {
            return Err(GraphError::InvalidArgument(
                "top_k must be a positive integer".to_string(),
            ));
        }
        if query_vector.is_empty() {
            return Err(GraphError::InvalidArgument("query vector is empty".to_string()));
        }
        validate_predicate(embedding_predicate)?;

        let mut nodes = conn
            .nearest(embedding_predicate, query_vector, top_k, selection)
            .await?;
        nodes.truncate(top_k);

        tracing::debug!(
            predicate = embedding_predicate,
            top_k,
            returned = nodes.len(),
            "Similarity search complete"
        );

        Ok(nodes)
    }
}

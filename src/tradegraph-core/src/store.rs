use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;

use crate::connection::{Filter, GraphConnection, MutationResult, Selection};
use crate::delete;
use crate::embedding::attach_embedding;
use crate::error::{GraphError, Result};
use crate::mutation::MutationBuilder;
use crate::schema::SchemaRegistry;
use crate::search::SimilaritySearcher;
use crate::tree::EntityTree;

/// How identity resolution is guarded against concurrent writers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMode {
    /// Resolve and write without coordination. Two writers racing on the same
    /// new business key can each create a node.
    #[default]
    #[serde(rename = "unguarded")]
    Unguarded,
    /// Hold a per-(type, key) lock from resolution until the mutation commits.
    /// Only serializes writers sharing this `EntityStore`; other processes can
    /// still race.
    #[serde(rename = "serialized")]
    SerializedPerKey,
}

/// Embedding to attach to the root node of an upsert
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingField<'a> {
    pub predicate: &'a str,
    pub vector: &'a [f32],
}

#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    /// Lock every key, in sorted order so overlapping sets cannot deadlock
    async fn acquire(&self, mut keys: Vec<String>) -> Vec<OwnedMutexGuard<()>> {
        keys.sort();
        keys.dedup();

        let mutexes: Vec<_> = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            keys.into_iter()
                .map(|k| locks.entry(k).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        guards
    }
}

/// Entity persistence over a graph store: upsert by business key, lookup,
/// similarity search and owner-scoped predicate deletion.
pub struct EntityStore {
    schema: Arc<SchemaRegistry>,
    conn: Arc<dyn GraphConnection>,
    mode: ResolutionMode,
    locks: KeyLocks,
}

impl EntityStore {
    pub fn new(schema: Arc<SchemaRegistry>, conn: Arc<dyn GraphConnection>) -> Self {
        Self {
            schema,
            conn,
            mode: ResolutionMode::default(),
            locks: KeyLocks::default(),
        }
    }

    pub fn with_resolution(mut self, mode: ResolutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn connection(&self) -> &dyn GraphConnection {
        self.conn.as_ref()
    }

    pub fn resolution(&self) -> ResolutionMode {
        self.mode
    }

    /// Build the mutation for `tree` without sending it
    pub async fn build(&self, root_type: &str, tree: &EntityTree) -> Result<Value> {
        MutationBuilder::new(&self.schema)
            .build(self.conn.as_ref(), root_type, tree)
            .await
    }

    /// Build, optionally attach an embedding, and commit as one mutation
    pub async fn upsert(
        &self,
        root_type: &str,
        tree: &EntityTree,
        embedding: Option<EmbeddingField<'_>>,
    ) -> Result<MutationResult> {
        let builder = MutationBuilder::new(&self.schema);
        builder.validate(root_type, tree)?;

        let _guards = match self.mode {
            ResolutionMode::Unguarded => Vec::new(),
            ResolutionMode::SerializedPerKey => {
                let keys = builder
                    .business_keys(root_type, tree)?
                    .into_iter()
                    .map(|(node_type, key)| format!("{}\u{0}{}", node_type, key))
                    .collect();
                self.locks.acquire(keys).await
            }
        };

        let mut payload = builder.build(self.conn.as_ref(), root_type, tree).await?;
        if let Some(field) = embedding {
            payload = attach_embedding(payload, field.predicate, field.vector)?;
        }

        let result = self.conn.mutate(&payload).await?;
        tracing::info!(
            root_type,
            new_nodes = result.uids.len(),
            "Upsert committed"
        );
        Ok(result)
    }

    /// Serialize a typed record and upsert it
    pub async fn upsert_entity<T: Serialize>(
        &self,
        root_type: &str,
        entity: &T,
        embedding: Option<EmbeddingField<'_>>,
    ) -> Result<MutationResult> {
        let tree = EntityTree::from_entity(entity)?;
        self.upsert(root_type, &tree, embedding).await
    }

    /// Fetch the node of `node_type` whose business key equals `key`
    pub async fn get_by_key<T: DeserializeOwned>(
        &self,
        node_type: &str,
        key: impl Into<Value>,
        selection: &Selection,
    ) -> Result<Option<T>> {
        let entry = self.schema.lookup(node_type)?;
        let key = key.into();
        let mut nodes = self
            .conn
            .query(&Filter::eq(entry.id_field.clone(), key.clone()), selection)
            .await?;

        match nodes.len() {
            0 => Ok(None),
            1 => Ok(nodes.pop().map(serde_json::from_value).transpose()?),
            matches => Err(GraphError::AmbiguousKey {
                node_type: node_type.to_string(),
                id_field: entry.id_field.clone(),
                value: key,
                matches,
            }),
        }
    }

    pub async fn search<T: DeserializeOwned>(
        &self,
        query_vector: &[f32],
        embedding_predicate: &str,
        selection: &Selection,
        top_k: usize,
    ) -> Result<Vec<T>> {
        SimilaritySearcher::new()
            .search(
                self.conn.as_ref(),
                query_vector,
                embedding_predicate,
                selection,
                top_k,
            )
            .await
    }

    pub async fn delete_predicates(&self, filter: &Filter, predicates: &[String]) -> Result<()> {
        delete::delete_predicates(self.conn.as_ref(), filter, predicates).await
    }
}

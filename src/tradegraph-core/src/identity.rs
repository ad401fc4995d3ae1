use serde_json::Value;

use crate::connection::{Filter, GraphConnection, Selection, BLANK_PREFIX, UID};
use crate::error::{GraphError, Result};
use crate::schema::SchemaRegistry;

/// Internal identity of a node within one mutation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeIdentity {
    /// Uid of a node already in the store
    Existing(String),
    /// Freshly allocated blank label, bound when the mutation commits
    Blank(String),
}

impl NodeIdentity {
    pub fn blank() -> Self {
        NodeIdentity::Blank(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Value written into the node's `uid` field
    pub fn marker(&self) -> String {
        match self {
            NodeIdentity::Existing(uid) => uid.clone(),
            NodeIdentity::Blank(label) => format!("{}{}", BLANK_PREFIX, label),
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, NodeIdentity::Blank(_))
    }
}

/// Maps `(node type, business key)` to the node that already carries it.
///
/// Lookups are read-only. Nothing is cached: each call is one round trip.
pub struct IdentityResolver<'a> {
    schema: &'a SchemaRegistry,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(schema: &'a SchemaRegistry) -> Self {
        Self { schema }
    }

    pub async fn resolve(
        &self,
        conn: &dyn GraphConnection,
        node_type: &str,
        key: &Value,
    ) -> Result<NodeIdentity> {
        let entry = self.schema.lookup(node_type)?;
        let filter = Filter::eq(entry.id_field.clone(), key.clone());
        let matches = conn.query(&filter, &Selection::new().uid()).await?;

        match matches.as_slice() {
            [] => {
                let identity = NodeIdentity::blank();
                tracing::debug!(node_type, key = %key, marker = %identity.marker(), "New node");
                Ok(identity)
            }
            [node] => {
                let uid = node
                    .get(UID)
                    .and_then(Value::as_str)
                    .ok_or_else(|| GraphError::Store(format!("{} match has no uid", node_type)))?;
                tracing::debug!(node_type, key = %key, uid, "Existing node");
                Ok(NodeIdentity::Existing(uid.to_string()))
            }
            many => {
                tracing::warn!(
                    node_type,
                    id_field = %entry.id_field,
                    key = %key,
                    matches = many.len(),
                    "Business key is not unique"
                );
                Err(GraphError::AmbiguousKey {
                    node_type: node_type.to_string(),
                    id_field: entry.id_field.clone(),
                    value: key.clone(),
                    matches: many.len(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use serde_json::json;

    fn schema() -> SchemaRegistry {
        let mut schema = SchemaRegistry::new();
        schema.register("Party", "Party.id", vec![]);
        schema
    }

    #[test]
    fn test_markers() {
        assert_eq!(NodeIdentity::Existing("0x2a".into()).marker(), "0x2a");
        let blank = NodeIdentity::blank();
        assert!(blank.is_new());
        assert!(blank.marker().starts_with("_:"));
        assert_ne!(blank, NodeIdentity::blank());
    }

    #[tokio::test]
    async fn test_resolve_missing_key_is_new() {
        let schema = schema();
        let graph = MemoryGraph::new();

        let identity = IdentityResolver::new(&schema)
            .resolve(&graph, "Party", &json!("P1"))
            .await
            .unwrap();

        assert!(identity.is_new());
        assert_eq!(graph.stats().queries, 1);
        assert_eq!(graph.stats().mutations, 0);
    }

    #[tokio::test]
    async fn test_resolve_existing_key() {
        let schema = schema();
        let graph = MemoryGraph::new();
        let result = graph
            .mutate(&json!({"uid": "_:p", "dgraph.type": "Party", "Party.id": "P1"}))
            .await
            .unwrap();

        let identity = IdentityResolver::new(&schema)
            .resolve(&graph, "Party", &json!("P1"))
            .await
            .unwrap();

        assert_eq!(identity, NodeIdentity::Existing(result.uids["p"].clone()));
    }

    #[tokio::test]
    async fn test_resolve_duplicate_key_is_ambiguous() {
        let schema = schema();
        let graph = MemoryGraph::new();
        graph
            .mutate(&json!({"uid": "_:a", "Party.id": "P1"}))
            .await
            .unwrap();
        graph
            .mutate(&json!({"uid": "_:b", "Party.id": "P1"}))
            .await
            .unwrap();

        let err = IdentityResolver::new(&schema)
            .resolve(&graph, "Party", &json!("P1"))
            .await
            .unwrap_err();

        assert!(matches!(err, GraphError::AmbiguousKey { matches: 2, .. }));
    }

    #[tokio::test]
    async fn test_resolve_unknown_type() {
        let schema = schema();
        let graph = MemoryGraph::new();

        let err = IdentityResolver::new(&schema)
            .resolve(&graph, "Contract", &json!("C1"))
            .await
            .unwrap_err();

        assert!(matches!(err, GraphError::UnknownType(_)));
        assert_eq!(graph.stats().queries, 0);
    }
}

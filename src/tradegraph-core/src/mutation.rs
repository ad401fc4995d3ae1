//! Schema-driven mutation building.
//!
//! Building runs in three stages so each can be exercised against a fake
//! store on its own:
//! 1. `validate` walks the tree offline (types known, keys present);
//! 2. `resolve` looks up one identity per node, depth-first;
//! 3. `ResolvedNode::assemble` renders the JSON set-payload.
//!
//! Nothing is sent to the store until the whole payload exists, so a failure
//! anywhere in the walk leaves the store untouched.

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::connection::{GraphConnection, TYPE_PREDICATE, UID};
use crate::error::{GraphError, Result};
use crate::identity::{IdentityResolver, NodeIdentity};
use crate::schema::SchemaRegistry;
use crate::tree::{EntityTree, FieldValue};

/// A node whose identity and nested relationships have been resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNode {
    pub node_type: String,
    pub key: Value,
    pub identity: NodeIdentity,
    pub fields: Vec<(String, ResolvedField)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedField {
    Value(Value),
    Node(ResolvedNode),
}

impl ResolvedNode {
    /// Render the node as a store mutation: identity marker and type tag
    /// alongside its predicates, relationships nested in place.
    pub fn assemble(&self) -> Value {
        let mut out = Map::new();
        out.insert(UID.to_string(), Value::String(self.identity.marker()));
        out.insert(
            TYPE_PREDICATE.to_string(),
            Value::String(self.node_type.clone()),
        );
        for (predicate, field) in &self.fields {
            let value = match field {
                ResolvedField::Value(v) => v.clone(),
                ResolvedField::Node(node) => node.assemble(),
            };
            out.insert(predicate.clone(), value);
        }
        Value::Object(out)
    }

    /// Every `(node type, identity)` in the tree, root first
    pub fn identities(&self) -> Vec<(&str, &NodeIdentity)> {
        let mut out = vec![(self.node_type.as_str(), &self.identity)];
        for (_, field) in &self.fields {
            if let ResolvedField::Node(node) = field {
                out.extend(node.identities());
            }
        }
        out
    }

    /// Give every new node with the same type and key one blank label, so a
    /// key repeated within the tree becomes a single node.
    pub fn share_blank_labels(&mut self) {
        self.share_with(&mut HashMap::new());
    }

    fn share_with(&mut self, seen: &mut HashMap<(String, String), NodeIdentity>) {
        if self.identity.is_new() {
            let slot = (self.node_type.clone(), self.key.to_string());
            self.identity = seen.entry(slot).or_insert_with(|| self.identity.clone()).clone();
        }
        for (_, field) in &mut self.fields {
            if let ResolvedField::Node(node) = field {
                node.share_with(seen);
            }
        }
    }
}

pub struct MutationBuilder<'a> {
    schema: &'a SchemaRegistry,
}

impl<'a> MutationBuilder<'a> {
    pub fn new(schema: &'a SchemaRegistry) -> Self {
        Self { schema }
    }

    /// Build the set-payload for `tree` rooted at `root_type`.
    ///
    /// Each node costs one identity lookup; repeated keys are looked up again.
    pub async fn build(
        &self,
        conn: &dyn GraphConnection,
        root_type: &str,
        tree: &EntityTree,
    ) -> Result<Value> {
        self.validate(root_type, tree)?;
        let mut resolved = self.resolve(conn, root_type, tree).await?;
        resolved.share_blank_labels();

        let identities = resolved.identities();
        let new_nodes = identities.iter().filter(|(_, id)| id.is_new()).count();
        tracing::debug!(
            root_type,
            nodes = identities.len(),
            new_nodes,
            "Mutation payload built"
        );

        Ok(resolved.assemble())
    }

    /// Check types and business keys for the whole tree without touching the store
    pub fn validate(&self, node_type: &str, tree: &EntityTree) -> Result<()> {
        let entry = self.schema.lookup(node_type)?;
        if tree.key(&entry.id_field).is_none() {
            return Err(GraphError::MissingIdentity {
                node_type: node_type.to_string(),
                id_field: entry.id_field.clone(),
            });
        }

        for rel in &entry.relationships {
            if let Some(FieldValue::Nested(child)) = tree.get(&rel.predicate) {
                self.validate(&rel.target_type, child)?;
            }
        }
        Ok(())
    }

    /// `(node type, business key)` for every node in a validated tree, root first
    pub fn business_keys(&self, node_type: &str, tree: &EntityTree) -> Result<Vec<(String, Value)>> {
        let entry = self.schema.lookup(node_type)?;
        let key = tree
            .key(&entry.id_field)
            .ok_or_else(|| GraphError::MissingIdentity {
                node_type: node_type.to_string(),
                id_field: entry.id_field.clone(),
            })?;

        let mut keys = vec![(node_type.to_string(), key.clone())];
        for rel in &entry.relationships {
            if let Some(FieldValue::Nested(child)) = tree.get(&rel.predicate) {
                keys.extend(self.business_keys(&rel.target_type, child)?);
            }
        }
        Ok(keys)
    }

    /// Resolve identities depth-first, substituting nested relationship values
    pub fn resolve<'b>(
        &'b self,
        conn: &'b dyn GraphConnection,
        node_type: &'b str,
        tree: &'b EntityTree,
    ) -> BoxFuture<'b, Result<ResolvedNode>> {
        async move {
            let entry = self.schema.lookup(node_type)?;
            let key = tree
                .key(&entry.id_field)
                .ok_or_else(|| GraphError::MissingIdentity {
                    node_type: node_type.to_string(),
                    id_field: entry.id_field.clone(),
                })?;

            let identity = IdentityResolver::new(self.schema)
                .resolve(conn, node_type, key)
                .await?;

            let mut fields = Vec::with_capacity(tree.len());
            for (predicate, value) in tree.fields() {
                if predicate == UID || predicate == TYPE_PREDICATE {
                    continue;
                }
                let field = match (entry.relationship(predicate), value) {
                    (_, FieldValue::Null) => continue,
                    (Some(rel), FieldValue::Nested(child)) => {
                        ResolvedField::Node(self.resolve(conn, &rel.target_type, child).await?)
                    }
                    (_, other) => ResolvedField::Value(other.to_value()),
                };
                fields.push((predicate.to_string(), field));
            }

            Ok(ResolvedNode {
                node_type: node_type.to_string(),
                key: key.clone(),
                identity,
                fields,
            })
        }
        .boxed()
    }
}

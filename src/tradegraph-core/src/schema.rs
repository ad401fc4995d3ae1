use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Outbound relationship declared on a node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub predicate: String,
    pub target_type: String,
}

impl Relationship {
    pub fn new(predicate: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            target_type: target_type.into(),
        }
    }
}

/// Schema entry for one node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub node_type: String,
    /// Business key; the only field consulted for identity resolution
    pub id_field: String,
    pub relationships: Vec<Relationship>,
}

impl NodeSchema {
    /// Relationship declared for `predicate`, if any
    pub fn relationship(&self, predicate: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.predicate == predicate)
    }
}

/// Static description of node types, addressed by name.
///
/// Relationship targets are stored as type names and resolved by lookup, so
/// cyclic schemas (a type pointing back at itself or an ancestor) need no
/// special handling. Populate once at startup, then share behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entries: Vec<NodeSchema>,
    by_name: HashMap<String, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry, replacing any previous entry for the same type
    pub fn register(
        &mut self,
        node_type: impl Into<String>,
        id_field: impl Into<String>,
        relationships: Vec<Relationship>,
    ) -> &mut Self {
        let entry = NodeSchema {
            node_type: node_type.into(),
            id_field: id_field.into(),
            relationships,
        };

        match self.by_name.get(&entry.node_type) {
            Some(&idx) => {
                tracing::warn!(node_type = %entry.node_type, "Replacing schema entry");
                self.entries[idx] = entry;
            }
            None => {
                self.by_name
                    .insert(entry.node_type.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }

        self
    }

    pub fn lookup(&self, node_type: &str) -> Result<&NodeSchema> {
        self.by_name
            .get(node_type)
            .map(|&idx| &self.entries[idx])
            .ok_or_else(|| GraphError::UnknownType(node_type.to_string()))
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.by_name.contains_key(node_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeSchema> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that every relationship points at a registered type
    pub fn validate(&self) -> Result<()> {
        for entry in &self.entries {
            for rel in &entry.relationships {
                if !self.contains(&rel.target_type) {
                    return Err(GraphError::UnknownType(rel.target_type.clone()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract_schema() -> SchemaRegistry {
        let mut schema = SchemaRegistry::new();
        schema
            .register(
                "Contract",
                "Contract.id",
                vec![Relationship::new("Contract.party", "Party")],
            )
            .register("Party", "Party.id", vec![]);
        schema
    }

    #[test]
    fn test_lookup_registered_type() {
        let schema = contract_schema();
        let entry = schema.lookup("Contract").unwrap();

        assert_eq!(entry.id_field, "Contract.id");
        assert_eq!(
            entry.relationship("Contract.party").map(|r| r.target_type.as_str()),
            Some("Party")
        );
        assert!(entry.relationship("Contract.id").is_none());
    }

    #[test]
    fn test_lookup_unknown_type() {
        let schema = contract_schema();
        let err = schema.lookup("Invoice").unwrap_err();
        assert!(matches!(err, GraphError::UnknownType(t) if t == "Invoice"));
    }

    #[test]
    fn test_register_replaces_entry() {
        let mut schema = contract_schema();
        schema.register("Party", "Party.code", vec![]);

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.lookup("Party").unwrap().id_field, "Party.code");
    }

    #[test]
    fn test_validate_cyclic_schema() {
        let mut schema = SchemaRegistry::new();
        schema
            .register(
                "Employee",
                "Employee.id",
                vec![Relationship::new("Employee.manager", "Employee")],
            );
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_validate_dangling_target() {
        let mut schema = SchemaRegistry::new();
        schema.register(
            "Contract",
            "Contract.id",
            vec![Relationship::new("Contract.party", "Party")],
        );
        assert!(matches!(schema.validate(), Err(GraphError::UnknownType(t)) if t == "Party"));
    }
}

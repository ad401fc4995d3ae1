use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{GraphError, Result};

/// One predicate's value inside a serialized entity
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    Nested(EntityTree),
    Null,
}

impl FieldValue {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Object(map) => FieldValue::Nested(EntityTree::from_map(map)),
            other => FieldValue::Scalar(other),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            FieldValue::Scalar(v) => v.clone(),
            FieldValue::Nested(tree) => tree.to_value(),
            FieldValue::Null => Value::Null,
        }
    }
}

/// Serialized entity: ordered `(predicate, value)` pairs.
///
/// Produced from a typed record whose fields are aliased `Type.field`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityTree {
    fields: Vec<(String, FieldValue)>,
}

impl EntityTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize a typed record into a tree
    pub fn from_entity<T: Serialize>(entity: &T) -> Result<Self> {
        Self::from_value(serde_json::to_value(entity)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(GraphError::InvalidArgument(format!(
                "entity must serialize to an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn from_map(map: Map<String, Value>) -> Self {
        Self {
            fields: map
                .into_iter()
                .map(|(k, v)| (k, FieldValue::from_value(v)))
                .collect(),
        }
    }

    pub fn with(mut self, predicate: impl Into<String>, value: FieldValue) -> Self {
        self.set(predicate, value);
        self
    }

    pub fn set(&mut self, predicate: impl Into<String>, value: FieldValue) {
        let predicate = predicate.into();
        match self.fields.iter_mut().find(|(p, _)| *p == predicate) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((predicate, value)),
        }
    }

    pub fn get(&self, predicate: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(p, _)| p == predicate)
            .map(|(_, v)| v)
    }

    /// Value of the business key, or `None` when absent, null or empty
    pub fn key(&self, id_field: &str) -> Option<&Value> {
        match self.get(id_field)? {
            FieldValue::Scalar(Value::String(s)) if s.is_empty() => None,
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(p, v)| (p.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(p, v)| (p.clone(), v.to_value()))
                .collect(),
        )
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Party {
        #[serde(rename = "Party.id")]
        id: String,
        #[serde(rename = "Party.name")]
        name: String,
    }

    #[derive(Serialize)]
    struct Contract {
        #[serde(rename = "Contract.id")]
        id: String,
        #[serde(rename = "Contract.party", skip_serializing_if = "Option::is_none")]
        party: Option<Party>,
        #[serde(rename = "Contract.broker")]
        broker: Option<Party>,
    }

    #[test]
    fn test_from_entity_classifies_fields() {
        let contract = Contract {
            id: "C1".to_string(),
            party: Some(Party {
                id: "P1".to_string(),
                name: "Acme".to_string(),
            }),
            broker: None,
        };
        let tree = EntityTree::from_entity(&contract).unwrap();

        assert_eq!(tree.key("Contract.id"), Some(&json!("C1")));
        assert_eq!(tree.get("Contract.broker"), Some(&FieldValue::Null));
        match tree.get("Contract.party") {
            Some(FieldValue::Nested(party)) => {
                assert_eq!(party.key("Party.id"), Some(&json!("P1")));
            }
            other => panic!("expected nested party, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_key_is_absent() {
        let tree = EntityTree::from_value(json!({"Party.id": "", "Party.name": "Acme"})).unwrap();
        assert!(tree.key("Party.id").is_none());
        assert!(tree.key("Party.code").is_none());
    }

    #[test]
    fn test_numeric_key_is_present() {
        let tree = EntityTree::from_value(json!({"Lot.number": 42})).unwrap();
        assert_eq!(tree.key("Lot.number"), Some(&json!(42)));
    }

    #[test]
    fn test_non_object_rejected() {
        let err = EntityTree::from_value(json!(["C1"])).unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument(_)));
    }

    #[test]
    fn test_set_overwrites_in_place() {
        let mut tree = EntityTree::new()
            .with("Party.id", FieldValue::Scalar(json!("P1")))
            .with("Party.name", FieldValue::Scalar(json!("Acme")));
        tree.set("Party.name", FieldValue::Scalar(json!("Acme Corp")));

        assert_eq!(tree.len(), 2);
        assert_eq!(
            tree.to_value(),
            json!({"Party.id": "P1", "Party.name": "Acme Corp"})
        );
    }
}

use serde_json::Value;

use crate::connection::{encode_vector, validate_predicate, TYPE_PREDICATE, UID};
use crate::error::{GraphError, Result};
use crate::tree::json_kind;

/// Attach `vector` under `predicate` on the root node of a built payload.
///
/// The payload must be a single root node carrying an identity marker and a
/// type tag, i.e. what `MutationBuilder::build` produces. The vector is
/// written as the same string literal `similar_to` queries use. An existing
/// value under `predicate` is replaced.
pub fn attach_embedding(mut payload: Value, predicate: &str, vector: &[f32]) -> Result<Value> {
    validate_predicate(predicate)?;
    if predicate == UID || predicate == TYPE_PREDICATE {
        return Err(GraphError::InvalidArgument(format!(
            "{} is reserved and cannot hold an embedding",
            predicate
        )));
    }
    let kind = json_kind(&payload);
    let root = payload.as_object_mut().ok_or_else(|| {
        GraphError::InvalidPayload(format!("expected a single root node, got {}", kind))
    })?;
    if !root.get(UID).is_some_and(Value::is_string) {
        return Err(GraphError::InvalidPayload(
            "root node has no identity marker".to_string(),
        ));
    }
    if !root.get(TYPE_PREDICATE).is_some_and(Value::is_string) {
        return Err(GraphError::InvalidPayload("root node has no type tag".to_string()));
    }

    root.insert(predicate.to_string(), Value::String(encode_vector(vector)?));
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "uid": "_:c1",
            "dgraph.type": "Contract",
            "Contract.id": "C1",
            "Contract.party": {"uid": "0x2", "dgraph.type": "Party", "Party.id": "P1"},
        })
    }

    #[test]
    fn test_attach_to_root_only() {
        let out = attach_embedding(payload(), "Contract.embedding", &[0.5, -1.0, 0.25]).unwrap();

        assert_eq!(out["Contract.embedding"], json!("[0.5,-1.0,0.25]"));
        assert!(out["Contract.party"].get("Contract.embedding").is_none());
        assert_eq!(out["Contract.id"], "C1");
    }

    #[test]
    fn test_attach_replaces_existing_vector() {
        let once = attach_embedding(payload(), "Contract.embedding", &[1.0]).unwrap();
        let twice = attach_embedding(once, "Contract.embedding", &[2.0, 3.0]).unwrap();
        assert_eq!(twice["Contract.embedding"], json!("[2.0,3.0]"));
    }

    #[test]
    fn test_rejects_list_payload() {
        let err = attach_embedding(json!([payload()]), "Contract.embedding", &[1.0]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidPayload(_)));
    }

    #[test]
    fn test_rejects_unbuilt_node() {
        let raw = json!({"Contract.id": "C1"});
        let err = attach_embedding(raw, "Contract.embedding", &[1.0]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidPayload(_)));

        let untyped = json!({"uid": "_:c1", "Contract.id": "C1"});
        let err = attach_embedding(untyped, "Contract.embedding", &[1.0]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidPayload(_)));
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(matches!(
            attach_embedding(payload(), "uid", &[1.0]),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            attach_embedding(payload(), "Contract.embedding", &[]),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            attach_embedding(payload(), "Contract.embedding", &[f32::NAN]),
            Err(GraphError::InvalidArgument(_))
        ));
    }
}

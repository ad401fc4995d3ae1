//! Store boundary.
//!
//! Everything the core needs from a graph store is expressed through
//! [`GraphConnection`]: equality point lookups, JSON set-mutations, vector
//! nearest-neighbour queries and predicate deletion. Filters and selections
//! are typed here and rendered by each implementation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GraphError, Result};

/// Identity marker field carried by every node in queries and mutations
pub const UID: &str = "uid";

/// Type tag field the store uses for per-type typing
pub const TYPE_PREDICATE: &str = "dgraph.type";

/// Prefix of a blank (not yet committed) node identity
pub const BLANK_PREFIX: &str = "_:";

/// Root node filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Nodes whose `predicate` equals `value`
    Eq { predicate: String, value: Value },
    /// Nodes carrying any value for the predicate
    Has(String),
}

impl Filter {
    pub fn eq(predicate: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            predicate: predicate.into(),
            value: value.into(),
        }
    }

    pub fn has(predicate: impl Into<String>) -> Self {
        Filter::Has(predicate.into())
    }

    pub fn predicate(&self) -> &str {
        match self {
            Filter::Eq { predicate, .. } => predicate,
            Filter::Has(predicate) => predicate,
        }
    }
}

/// A requested field in a [`Selection`]
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Uid,
    Scalar(String),
    Edge {
        predicate: String,
        /// Follow the edge backwards (`~predicate`)
        reverse: bool,
        alias: Option<String>,
        selection: Selection,
    },
}

impl Field {
    /// Key under which this field appears in a result node
    pub fn result_key(&self) -> String {
        match self {
            Field::Uid => UID.to_string(),
            Field::Scalar(p) => p.clone(),
            Field::Edge {
                alias: Some(alias), ..
            } => alias.clone(),
            Field::Edge {
                predicate,
                reverse: true,
                ..
            } => format!("~{}", predicate),
            Field::Edge { predicate, .. } => predicate.clone(),
        }
    }
}

/// Shape of the nodes a query returns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    fields: Vec<Field>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uid(mut self) -> Self {
        self.fields.push(Field::Uid);
        self
    }

    pub fn field(mut self, predicate: impl Into<String>) -> Self {
        self.fields.push(Field::Scalar(predicate.into()));
        self
    }

    pub fn fields<I, S>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .extend(predicates.into_iter().map(|p| Field::Scalar(p.into())));
        self
    }

    pub fn edge(mut self, predicate: impl Into<String>, selection: Selection) -> Self {
        self.fields.push(Field::Edge {
            predicate: predicate.into(),
            reverse: false,
            alias: None,
            selection,
        });
        self
    }

    /// Follow `predicate` backwards, reporting the result under `alias`
    pub fn reverse(
        mut self,
        predicate: impl Into<String>,
        alias: impl Into<String>,
        selection: Selection,
    ) -> Self {
        self.fields.push(Field::Edge {
            predicate: predicate.into(),
            reverse: true,
            alias: Some(alias.into()),
            selection,
        });
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Outcome of a committed mutation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResult {
    /// Blank label (without `_:`) -> permanent uid
    #[serde(default)]
    pub uids: HashMap<String, String>,
}

/// Connection to a graph store.
///
/// Implementations perform blocking round trips from the caller's point of
/// view; timeouts and cancellation belong to the transport.
#[async_trait::async_trait]
pub trait GraphConnection: Send + Sync {
    /// Point lookup of root nodes matching `filter`
    async fn query(&self, filter: &Filter, selection: &Selection) -> Result<Vec<Value>>;

    /// Apply a JSON set-mutation and commit it
    async fn mutate(&self, set: &Value) -> Result<MutationResult>;

    /// Up to `top_k` nodes nearest to `vector` over the vectors stored under
    /// `predicate`, most similar first
    async fn nearest(
        &self,
        predicate: &str,
        vector: &[f32],
        top_k: usize,
        selection: &Selection,
    ) -> Result<Vec<Value>>;

    /// Remove `predicates` from every node matching `filter`
    async fn delete_predicates(&self, filter: &Filter, predicates: &[String]) -> Result<()>;
}

/// Predicate names are interpolated into queries, so keep them to a safe
/// alphabet: alphanumerics, `.` and `_`.
pub fn validate_predicate(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(GraphError::InvalidArgument(format!(
            "invalid predicate name: {:?}",
            name
        )))
    }
}

/// Vector literal as the store expects it in both mutations and
/// `similar_to` queries: a JSON array rendered into a string.
pub fn encode_vector(vector: &[f32]) -> Result<String> {
    if vector.is_empty() {
        return Err(GraphError::InvalidArgument("vector is empty".to_string()));
    }
    if !vector.iter().all(|v| v.is_finite()) {
        return Err(GraphError::InvalidArgument(
            "vector contains a non-finite value".to_string(),
        ));
    }
    Ok(serde_json::to_string(vector)?)
}

/// Read a stored vector back, from its string literal or a plain JSON array
pub fn decode_vector(value: &Value) -> Option<Vec<f32>> {
    match value {
        Value::String(literal) => serde_json::from_str(literal).ok(),
        Value::Array(items) => items.iter().map(|v| v.as_f64().map(|f| f as f32)).collect(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vector_literal() {
        let literal = encode_vector(&[0.5, -1.0]).unwrap();
        assert_eq!(literal, "[0.5,-1.0]");
        assert_eq!(decode_vector(&json!(literal)), Some(vec![0.5, -1.0]));
        assert_eq!(decode_vector(&json!([0.5, -1.0])), Some(vec![0.5, -1.0]));
        assert_eq!(decode_vector(&json!("not a vector")), None);

        assert!(encode_vector(&[]).is_err());
        assert!(encode_vector(&[f32::INFINITY]).is_err());
    }

    #[test]
    fn test_validate_predicate() {
        assert!(validate_predicate("TradeContract.id").is_ok());
        assert!(validate_predicate("dgraph_type").is_ok());
        assert!(validate_predicate("").is_err());
        assert!(validate_predicate("Contract.id) { uid }").is_err());
        assert!(validate_predicate("~Contract.party").is_err());
    }

    #[test]
    fn test_result_keys() {
        let selection = Selection::new()
            .uid()
            .field("Party.name")
            .edge("Contract.party", Selection::new().uid())
            .reverse("Contract.party", "contracts", Selection::new().uid());
        let keys: Vec<String> = selection.iter().map(Field::result_key).collect();

        assert_eq!(keys, vec!["uid", "Party.name", "Contract.party", "contracts"]);
    }

    #[test]
    fn test_unaliased_reverse_key() {
        let field = Field::Edge {
            predicate: "Contract.party".to_string(),
            reverse: true,
            alias: None,
            selection: Selection::new(),
        };
        assert_eq!(field.result_key(), "~Contract.party");
    }

    #[test]
    fn test_filter_predicate() {
        assert_eq!(Filter::eq("Party.id", "P1").predicate(), "Party.id");
        assert_eq!(Filter::has("Party.name").predicate(), "Party.name");
    }
}

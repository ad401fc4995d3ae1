//! Dgraph HTTP connection.
//!
//! Queries are DQL rendered from typed filters and selections; predicate
//! names are validated before interpolation and values are always written as
//! JSON-quoted literals.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::connection::{
    encode_vector, validate_predicate, Field, Filter, GraphConnection, MutationResult, Selection, UID,
};
use crate::error::{GraphError, Result};

const ROOT_BLOCK: &str = "q";
const DELETE_VAR: &str = "v";

pub struct DgraphConnection {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct DgraphResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<DgraphErrorMessage>,
}

#[derive(Deserialize)]
struct DgraphErrorMessage {
    message: String,
}

impl DgraphConnection {
    pub fn new(base_url: impl Into<String>, insecure_skip_verify: bool) -> Result<Self> {
        let client = if insecure_skip_verify {
            Client::builder()
                .danger_accept_invalid_certs(true)
                .build()?
        } else {
            Client::new()
        };

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn run_query(&self, dql: String) -> Result<Vec<Value>> {
        tracing::debug!(dql = %dql, "Dgraph query");
        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/dql")
            .body(dql)
            .send()
            .await?;

        let data = read_response(response).await?;
        match data.and_then(|mut d| d.get_mut(ROOT_BLOCK).map(Value::take)) {
            Some(Value::Array(nodes)) => Ok(nodes),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(GraphError::Store(format!(
                "unexpected query result: {}",
                other
            ))),
        }
    }

    async fn run_mutation(&self, body: &Value) -> Result<Option<Value>> {
        let response = self
            .client
            .post(format!("{}/mutate?commitNow=true", self.base_url))
            .json(body)
            .send()
            .await?;

        read_response(response).await
    }
}

#[async_trait::async_trait]
impl GraphConnection for DgraphConnection {
    async fn query(&self, filter: &Filter, selection: &Selection) -> Result<Vec<Value>> {
        let dql = render_query(&render_filter(filter)?, selection)?;
        self.run_query(dql).await
    }

    async fn mutate(&self, set: &Value) -> Result<MutationResult> {
        let data = self.run_mutation(&json!({ "set": set })).await?;

        let uids = data
            .and_then(|mut d| d.get_mut("uids").map(Value::take))
            .unwrap_or(Value::Null);
        let uids = match uids {
            Value::Null => Default::default(),
            other => serde_json::from_value(other)?,
        };

        let result = MutationResult { uids };
        tracing::info!(new_nodes = result.uids.len(), "Mutation committed");
        Ok(result)
    }

    async fn nearest(
        &self,
        predicate: &str,
        vector: &[f32],
        top_k: usize,
        selection: &Selection,
    ) -> Result<Vec<Value>> {
        let dql = render_query(&render_similar_to(predicate, vector, top_k)?, selection)?;
        self.run_query(dql).await
    }

    async fn delete_predicates(&self, filter: &Filter, predicates: &[String]) -> Result<()> {
        let body = render_delete(filter, predicates)?;
        self.run_mutation(&body).await?;
        Ok(())
    }
}

async fn read_response(response: reqwest::Response) -> Result<Option<Value>> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(GraphError::StoreUnavailable {
            status: status.as_u16(),
            message,
        });
    }

    let body: DgraphResponse = response.json().await?;
    if !body.errors.is_empty() {
        let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
        return Err(GraphError::Store(messages.join("; ")));
    }
    Ok(body.data)
}

/// Render a scalar as a DQL literal
fn render_literal(value: &Value) -> Result<String> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(serde_json::to_string(value)?),
        other => Err(GraphError::InvalidArgument(format!(
            "cannot filter on non-scalar value {}",
            other
        ))),
    }
}

pub(crate) fn render_filter(filter: &Filter) -> Result<String> {
    validate_predicate(filter.predicate())?;
    match filter {
        Filter::Eq { predicate, value } => {
            Ok(format!("eq({}, {})", predicate, render_literal(value)?))
        }
        Filter::Has(predicate) => Ok(format!("has({})", predicate)),
    }
}

pub(crate) fn render_similar_to(predicate: &str, vector: &[f32], top_k: usize) -> Result<String> {
    validate_predicate(predicate)?;
    let vector = encode_vector(vector)?;
    Ok(format!(
        "similar_to({}, {}, {})",
        predicate,
        top_k,
        serde_json::to_string(&vector)?
    ))
}

pub(crate) fn render_selection(selection: &Selection) -> Result<String> {
    if selection.is_empty() {
        return Ok(UID.to_string());
    }

    let mut parts = Vec::new();
    for field in selection.iter() {
        let part = match field {
            Field::Uid => UID.to_string(),
            Field::Scalar(predicate) => {
                validate_predicate(predicate)?;
                predicate.clone()
            }
            Field::Edge {
                predicate,
                reverse,
                alias,
                selection,
            } => {
                validate_predicate(predicate)?;
                let edge = if *reverse {
                    format!("~{}", predicate)
                } else {
                    predicate.clone()
                };
                let head = match alias {
                    Some(alias) => {
                        validate_predicate(alias)?;
                        format!("{}: {}", alias, edge)
                    }
                    None => edge,
                };
                format!("{} {{ {} }}", head, render_selection(selection)?)
            }
        };
        parts.push(part);
    }
    Ok(parts.join(" "))
}

pub(crate) fn render_query(func: &str, selection: &Selection) -> Result<String> {
    Ok(format!(
        "{{ {}(func: {}) {{ {} }} }}",
        ROOT_BLOCK,
        func,
        render_selection(selection)?
    ))
}

/// Upsert block: bind the matches to a variable, then null out each predicate
pub(crate) fn render_delete(filter: &Filter, predicates: &[String]) -> Result<Value> {
    let mut target = Map::new();
    target.insert(UID.to_string(), json!(format!("uid({})", DELETE_VAR)));
    for predicate in predicates {
        validate_predicate(predicate)?;
        target.insert(predicate.clone(), Value::Null);
    }

    Ok(json!({
        "query": format!("{{ {} as var(func: {}) }}", DELETE_VAR, render_filter(filter)?),
        "delete": [Value::Object(target)],
    }))
}

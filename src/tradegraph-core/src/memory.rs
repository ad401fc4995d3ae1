//! In-process fake of the graph store.
//!
//! Behaves like the store at the [`GraphConnection`] boundary (blank-label
//! binding, uid re-use, forward and reverse edges, brute-force cosine
//! nearest-neighbour, predicate deletion) so the core can be tested and
//! demoed without a server. Every call is counted.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use crate::connection::{
    decode_vector, Field, Filter, GraphConnection, MutationResult, Selection, BLANK_PREFIX, UID,
};
use crate::error::{GraphError, Result};

/// Calls received, per boundary operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub queries: usize,
    pub mutations: usize,
    pub nearest: usize,
    pub deletes: usize,
}

impl MemoryStats {
    pub fn total(&self) -> usize {
        self.queries + self.mutations + self.nearest + self.deletes
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Stored {
    Scalar(Value),
    Edge(u64),
}

type Node = BTreeMap<String, Stored>;

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<u64, Node>,
    next_uid: u64,
    stats: MemoryStats,
}

#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> MemoryStats {
        self.state().stats
    }

    /// Nodes ever created, including ones stripped of all predicates
    pub fn node_count(&self) -> usize {
        self.state().nodes.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl GraphConnection for MemoryGraph {
    async fn query(&self, filter: &Filter, selection: &Selection) -> Result<Vec<Value>> {
        let mut state = self.state();
        state.stats.queries += 1;

        let roots: Vec<u64> = state
            .nodes
            .iter()
            .filter(|(_, node)| matches_filter(node, filter))
            .map(|(&uid, _)| uid)
            .collect();

        Ok(roots
            .into_iter()
            .filter_map(|uid| state.render(uid, selection))
            .collect())
    }

    async fn mutate(&self, set: &Value) -> Result<MutationResult> {
        let mut state = self.state();
        state.stats.mutations += 1;

        // Apply to a copy so a rejected payload leaves nothing behind
        let mut nodes = state.nodes.clone();
        let mut next_uid = state.next_uid;
        let mut labels = HashMap::new();

        let roots: Vec<&Value> = match set {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for root in roots {
            let obj = root.as_object().ok_or_else(|| {
                GraphError::Store("mutation entries must be objects".to_string())
            })?;
            apply(&mut nodes, &mut next_uid, &mut labels, obj)?;
        }

        state.nodes = nodes;
        state.next_uid = next_uid;

        Ok(MutationResult {
            uids: labels
                .into_iter()
                .map(|(label, uid)| (label, format_uid(uid)))
                .collect(),
        })
    }

    async fn nearest(
        &self,
        predicate: &str,
        vector: &[f32],
        top_k: usize,
        selection: &Selection,
    ) -> Result<Vec<Value>> {
        let mut state = self.state();
        state.stats.nearest += 1;

        let mut scored: Vec<(u64, f64)> = state
            .nodes
            .iter()
            .filter_map(|(&uid, node)| match node.get(predicate) {
                Some(Stored::Scalar(value)) => {
                    let stored = decode_vector(value).filter(|s| s.len() == vector.len())?;
                    Some((uid, cosine_similarity(vector, &stored)))
                }
                _ => None,
            })
            .collect();

        // Stable sort keeps insertion order among ties
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .filter_map(|(uid, _)| state.render(uid, selection))
            .collect())
    }

    async fn delete_predicates(&self, filter: &Filter, predicates: &[String]) -> Result<()> {
        let mut state = self.state();
        state.stats.deletes += 1;

        for node in state.nodes.values_mut() {
            if matches_filter(node, filter) {
                for predicate in predicates {
                    node.remove(predicate);
                }
            }
        }
        Ok(())
    }
}

impl State {
    fn render(&self, uid: u64, selection: &Selection) -> Option<Value> {
        let node = self.nodes.get(&uid)?;
        let mut out = Map::new();

        for field in selection.iter() {
            match field {
                Field::Uid => {
                    out.insert(UID.to_string(), Value::String(format_uid(uid)));
                }
                Field::Scalar(predicate) => {
                    if let Some(Stored::Scalar(value)) = node.get(predicate) {
                        out.insert(predicate.clone(), value.clone());
                    }
                }
                Field::Edge {
                    predicate,
                    reverse: false,
                    selection,
                    ..
                } => {
                    if let Some(Stored::Edge(target)) = node.get(predicate) {
                        if let Some(child) = self.render(*target, selection) {
                            out.insert(field.result_key(), child);
                        }
                    }
                }
                Field::Edge {
                    predicate,
                    reverse: true,
                    selection,
                    ..
                } => {
                    let sources: Vec<Value> = self
                        .nodes
                        .iter()
                        .filter(|(_, n)| n.get(predicate) == Some(&Stored::Edge(uid)))
                        .filter_map(|(&source, _)| self.render(source, selection))
                        .collect();
                    if !sources.is_empty() {
                        out.insert(field.result_key(), Value::Array(sources));
                    }
                }
            }
        }

        (!out.is_empty()).then_some(Value::Object(out))
    }
}

fn apply(
    nodes: &mut BTreeMap<u64, Node>,
    next_uid: &mut u64,
    labels: &mut HashMap<String, u64>,
    obj: &Map<String, Value>,
) -> Result<u64> {
    let uid = match obj.get(UID) {
        None => allocate(next_uid),
        Some(Value::String(marker)) => match marker.strip_prefix(BLANK_PREFIX) {
            Some(label) => *labels
                .entry(label.to_string())
                .or_insert_with(|| allocate(next_uid)),
            None => parse_uid(marker)?,
        },
        Some(other) => {
            return Err(GraphError::Store(format!("invalid uid marker: {}", other)));
        }
    };
    nodes.entry(uid).or_default();

    for (predicate, value) in obj {
        if predicate == UID {
            continue;
        }
        let stored = match value {
            Value::Null => continue,
            Value::Object(child) => Stored::Edge(apply(nodes, next_uid, labels, child)?),
            other => Stored::Scalar(other.clone()),
        };
        if let Some(node) = nodes.get_mut(&uid) {
            node.insert(predicate.clone(), stored);
        }
    }
    Ok(uid)
}

fn allocate(next_uid: &mut u64) -> u64 {
    *next_uid += 1;
    *next_uid
}

fn format_uid(uid: u64) -> String {
    format!("0x{:x}", uid)
}

fn parse_uid(marker: &str) -> Result<u64> {
    marker
        .strip_prefix("0x")
        .and_then(|hex| u64::from_str_radix(hex, 16).ok())
        .ok_or_else(|| GraphError::Store(format!("invalid uid: {}", marker)))
}

fn matches_filter(node: &Node, filter: &Filter) -> bool {
    match filter {
        Filter::Eq { predicate, value } => {
            matches!(node.get(predicate), Some(Stored::Scalar(v)) if v == value)
        }
        Filter::Has(predicate) => node.contains_key(predicate),
    }
}

/// Calculate cosine similarity between two vectors
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot_product = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b) {
        dot_product += (x * y) as f64;
        norm_a += (x * x) as f64;
        norm_b += (y * y) as f64;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a.sqrt() * norm_b.sqrt())
}

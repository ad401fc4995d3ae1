//! TradeGraph Core Library
//!
//! Schema-driven persistence of nested entities in a graph store:
//! - Schema registry of node types, business keys and relationships
//! - Identity resolution (upsert by business key)
//! - Mutation building and embedding attachment
//! - Similarity search over embedding predicates
//! - Owner-scoped predicate deletion
//! - Dgraph and in-memory store connections
//! - Trade contract domain on top of the above

pub mod cache;
pub mod config;
pub mod connection;
pub mod delete;
pub mod dgraph;
pub mod embedder;
pub mod embedding;
pub mod error;
pub mod identity;
pub mod memory;
pub mod models;
pub mod mutation;
pub mod schema;
pub mod search;
pub mod store;
pub mod trade;
pub mod tree;

// Re-export commonly used types
pub use cache::EmbeddingCache;
pub use config::Config;
pub use connection::{Filter, GraphConnection, MutationResult, Selection};
pub use dgraph::DgraphConnection;
pub use embedder::{Embedder, HashEmbedder, OpenAIEmbedder};
pub use embedding::attach_embedding;
pub use error::{GraphError, Result};
pub use identity::{IdentityResolver, NodeIdentity};
pub use memory::MemoryGraph;
pub use models::*;
pub use mutation::MutationBuilder;
pub use schema::{NodeSchema, Relationship, SchemaRegistry};
pub use search::SimilaritySearcher;
pub use store::{EmbeddingField, EntityStore, ResolutionMode};
pub use trade::{describe_contract, trade_schema, TradeContracts};
pub use tree::{EntityTree, FieldValue};

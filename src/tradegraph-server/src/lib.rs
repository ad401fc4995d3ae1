//! tradegraph - graph persistence for trade contracts
//!
//! This crate provides both a library and binary for running tradegraph.
//!
//! # Embedded Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tradegraph_core::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = EntityStore::new(Arc::new(trade_schema()), Arc::new(MemoryGraph::new()));
//!     let contracts = TradeContracts::new(Arc::new(store), Arc::new(HashEmbedder::new(384)));
//!     // Use contracts directly...
//!     Ok(())
//! }
//! ```
//!
//! # Server Usage
//!
//! Run the binary to start the REST API server:
//! ```bash
//! tradegraph-server
//! ```

pub use tradegraph_core;

pub mod api;
pub mod telemetry;

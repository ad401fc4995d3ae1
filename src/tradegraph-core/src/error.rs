use serde_json::Value;

/// Errors surfaced by the persistence core.
///
/// Nothing here is retried internally; every variant reaches the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("unknown node type: {0}")]
    UnknownType(String),

    #[error("{node_type} is missing a value for its id field {id_field}")]
    MissingIdentity { node_type: String, id_field: String },

    #[error("{matches} {node_type} nodes share {id_field} = {value}")]
    AmbiguousKey {
        node_type: String,
        id_field: String,
        value: Value,
        matches: usize,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid mutation payload: {0}")]
    InvalidPayload(String),

    #[error("store unavailable: {status} - {message}")]
    StoreUnavailable { status: u16, message: String },

    #[error("store rejected the request: {0}")]
    Store(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),
}

impl GraphError {
    /// True for errors caused by the caller's input rather than the store.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            GraphError::UnknownType(_)
                | GraphError::MissingIdentity { .. }
                | GraphError::InvalidArgument(_)
                | GraphError::InvalidPayload(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

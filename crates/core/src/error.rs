//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown transition mode: {0}")]
    UnknownTransitionMode(String),

    #[error("{entity} has no `{field}` status field")]
    MissingStatusField { entity: String, field: String },

    #[error("invalid entity reference: {0}")]
    InvalidEntityRef(String),

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

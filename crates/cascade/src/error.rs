//! Cascade engine error types.

use softdel_core::{EntityRef, StatusField, ValidationErrors};
use softdel_metadata::MetadataError;
use thiserror::Error;

/// Errors surfaced by a cascade. None of them are retried by the engine.
#[derive(Debug, Error)]
pub enum CascadeError {
    /// The requested mode has no resolvable transition.
    #[error("unknown transition mode: {0}")]
    UnknownTransitionMode(String),

    /// The record's type never declared the status column the mode toggles.
    #[error("{entity} is not status capable: no `{field}` field")]
    RecordNotStatusCapable { entity: EntityRef, field: StatusField },

    #[error("{0} is already deleted")]
    AlreadyDeleted(EntityRef),

    #[error("{0} not found")]
    NotFound(EntityRef),

    /// Persisting a status change failed validation. The trail was rolled back.
    #[error("validation failed for {entity}: {errors}")]
    ValidationFailed {
        entity: EntityRef,
        errors: ValidationErrors,
    },

    /// A compensating write failed while rolling back. Data may be left
    /// partially deleted.
    #[error("rollback after validation failure on {entity} failed at {failed_at}: {source}")]
    RollbackFailed {
        entity: EntityRef,
        errors: ValidationErrors,
        failed_at: EntityRef,
        #[source]
        source: MetadataError,
    },

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl CascadeError {
    /// Original validation errors, for both the rolled-back and the
    /// failed-rollback case.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::ValidationFailed { errors, .. } | Self::RollbackFailed { errors, .. } => {
                Some(errors)
            }
            _ => None,
        }
    }
}

/// Result type for cascade operations.
pub type CascadeResult<T> = std::result::Result<T, CascadeError>;

use thiserror::Error;

/// Unified error type for repository operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation on {table}.{field}")]
    UniqueViolation {
        table: &'static str,
        field: &'static str,
        /// The conflicting value that caused the violation
        conflicting_value: String,
    },

    /// Entity cannot be removed or changed because other entities still point at it
    #[error("{entity_type} {entity_id} is still referenced by {referenced_by}")]
    Referenced {
        entity_type: &'static str,
        entity_id: String,
        referenced_by: String,
    },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type alias for repository operation results
pub type Result<T> = std::result::Result<T, DbError>;

//! Persistence errors

use thiserror::Error;

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors raised by a storage backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// A uniqueness or key constraint rejected the write
    #[error("Constraint '{constraint}' violated on table '{table}'")]
    ConstraintViolation { table: String, constraint: String },

    /// Table not known to the backend
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Payload cannot be written as given
    #[error("Invalid payload for table '{table}': {reason}")]
    InvalidPayload { table: String, reason: String },

    /// Any other backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl PersistenceError {
    /// Whether the storage engine rejected the write on a constraint
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, PersistenceError::ConstraintViolation { .. })
    }
}

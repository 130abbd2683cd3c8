//! Resource error types
//!
//! Error codes:
//! - UNKNOWN_IDENTIFIER
//! - INVALID_IDENTIFIER
//! - UPDATE_ISSUE
//! - DEPENDENCY_ERROR
//! - SAVE_ISSUE
//! - KEY_NOT_FOUND
//!
//! Schema and persistence failures outside of a save pass through with
//! their own codes. None of these are retried inside the engine.

use serde::Serialize;
use thiserror::Error;

use crate::persistence::PersistenceError;
use crate::schema::SchemaError;
use crate::tracker::Issues;

/// Result type for resource operations
pub type ResourceResult<T> = Result<T, ResourceError>;

/// A resource that refers to the one being deleted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Dependency {
    pub resource_type: String,
    pub identifier: i64,
}

impl Dependency {
    pub fn new(resource_type: impl Into<String>, identifier: i64) -> Self {
        Self {
            resource_type: resource_type.into(),
            identifier,
        }
    }
}

fn describe_identifier(identifier: &Option<i64>) -> String {
    identifier.map_or_else(|| "<none>".to_string(), |id| id.to_string())
}

/// Errors raised by the resource lifecycle
#[derive(Debug, Error)]
pub enum ResourceError {
    /// No row for the identifier, or no identifier at all
    #[error("Unknown identifier {} for resource '{resource}'", describe_identifier(.identifier))]
    UnknownIdentifier {
        resource: String,
        identifier: Option<i64>,
    },

    /// Supplied identifier is not an integer
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// Validation issues block the save
    #[error("Update issues: {0}")]
    UpdateIssue(Issues),

    /// Dependents block the delete
    #[error("Blocked by {} dependent resource(s)", .0.len())]
    DependencyError(Vec<Dependency>),

    /// Storage rejected the write
    #[error("Save rejected: {0}")]
    SaveIssue(#[source] PersistenceError),

    /// Read of an undeclared or unset field
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ResourceError {
    /// Convenience constructor for [`ResourceError::UnknownIdentifier`]
    pub fn unknown_identifier(resource: impl Into<String>, identifier: Option<i64>) -> Self {
        ResourceError::UnknownIdentifier {
            resource: resource.into(),
            identifier,
        }
    }

    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ResourceError::UnknownIdentifier { .. } => "UNKNOWN_IDENTIFIER",
            ResourceError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            ResourceError::UpdateIssue(_) => "UPDATE_ISSUE",
            ResourceError::DependencyError(_) => "DEPENDENCY_ERROR",
            ResourceError::SaveIssue(_) => "SAVE_ISSUE",
            ResourceError::KeyNotFound(_) => "KEY_NOT_FOUND",
            ResourceError::Schema(e) => e.code().code(),
            ResourceError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Issue payload of an [`ResourceError::UpdateIssue`]
    pub fn issues(&self) -> Option<&Issues> {
        match self {
            ResourceError::UpdateIssue(issues) => Some(issues),
            _ => None,
        }
    }

    /// Blocking set of a [`ResourceError::DependencyError`]
    pub fn dependencies(&self) -> Option<&[Dependency]> {
        match self {
            ResourceError::DependencyError(deps) => Some(deps),
            _ => None,
        }
    }
}

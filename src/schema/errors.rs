//! Schema error types
//!
//! Error codes:
//! - SCHEMA_MALFORMED
//! - SCHEMA_DUPLICATE_RESOURCE
//! - SCHEMA_UNKNOWN_RESOURCE
//! - SCHEMA_UNKNOWN_REFERENCE

use std::fmt;

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Definition file unreadable or structurally invalid
    Malformed,
    /// Resource type registered twice
    DuplicateResource,
    /// Resource type not in the catalog
    UnknownResource,
    /// A field references a resource type not in the catalog
    UnknownReference,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::Malformed => "SCHEMA_MALFORMED",
            SchemaErrorCode::DuplicateResource => "SCHEMA_DUPLICATE_RESOURCE",
            SchemaErrorCode::UnknownResource => "SCHEMA_UNKNOWN_RESOURCE",
            SchemaErrorCode::UnknownReference => "SCHEMA_UNKNOWN_REFERENCE",
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error type with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    resource: Option<String>,
}

impl SchemaError {
    /// Create an error for a malformed definition or definition file
    pub fn malformed(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::Malformed,
            message: format!("Malformed definition '{}': {}", source.into(), reason.into()),
            resource: None,
        }
    }

    /// Create a duplicate registration error
    pub fn duplicate(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self {
            code: SchemaErrorCode::DuplicateResource,
            message: format!("Resource '{}' is already registered", resource),
            resource: Some(resource),
        }
    }

    /// Create an unknown resource type error
    pub fn unknown_resource(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self {
            code: SchemaErrorCode::UnknownResource,
            message: format!("Resource '{}' not found", resource),
            resource: Some(resource),
        }
    }

    /// Create an error for a reference to an undeclared resource type
    pub fn unknown_reference(
        resource: impl Into<String>,
        field: &str,
        target: &str,
    ) -> Self {
        let resource = resource.into();
        Self {
            code: SchemaErrorCode::UnknownReference,
            message: format!(
                "Field '{}.{}' references unknown resource '{}'",
                resource, field, target
            ),
            resource: Some(resource),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the resource type if applicable
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

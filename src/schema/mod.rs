//! Schema subsystem
//!
//! Schemas are static, read-only descriptions of resource types. Each
//! resource type has a `fields` section and an optional `settings` section,
//! each mapping field names to a [`FieldSpec`]. Nothing in the engine
//! mutates a schema after the [`SchemaCatalog`] is built.

mod errors;
mod loader;
mod types;

pub use errors::{SchemaError, SchemaErrorCode, SchemaResult};
pub use loader::SchemaCatalog;
pub use types::{Dependent, FieldInfo, FieldSpec, FieldType, ResourceDef, SchemaSection};

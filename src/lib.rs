//! restrack - schema-driven resource validation and persistence
//!
//! A resource type is described by a static schema (`fields` and optional
//! `settings` sections). A [`resource::Resource`] tracks a mutable record
//! against that schema, validating and coercing every write, accumulating
//! issues instead of failing fast, and persisting through a narrow
//! [`persistence::Persistence`] contract.

pub mod config;
pub mod observability;
pub mod persistence;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod tracker;

pub use config::{ConfigError, EngineConfig};
pub use persistence::{MemoryStore, Persistence, PersistenceError, Row, TableSpec};
pub use registry::{ResourceManager, ResourceRegistry};
pub use resource::{
    Dependency, Resource, ResourceContext, ResourceError, ResourceResult, SaveOptions, UriResolver,
};
pub use schema::{FieldSpec, FieldType, ResourceDef, SchemaCatalog, SchemaSection};
pub use tracker::{IssueKind, Issues, Tracker};

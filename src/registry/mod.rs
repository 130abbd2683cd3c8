//! Resource registry
//!
//! Resources validate their reference fields, and describe their
//! dependents, through [`ResourceRegistry`]. [`ResourceManager`] is the
//! implementation backed by a schema catalog and a store.

mod manager;

use crate::resource::{Resource, ResourceResult};

pub use manager::ResourceManager;

/// Cross-resource lookups.
///
/// Must be callable concurrently when resources are validated in parallel.
pub trait ResourceRegistry: Send + Sync {
    /// Whether a `resource_type` row with `identifier` exists in scope
    fn exists(&self, resource_type: &str, identifier: i64) -> bool;

    /// Loads the `resource_type` resource with `identifier`
    fn resolve(&self, resource_type: &str, identifier: i64) -> ResourceResult<Resource>;
}

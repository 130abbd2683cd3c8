//! Resource subsystem
//!
//! - [`Resource`]: load / mutate / save / delete lifecycle of one record
//! - key translation between storage columns and public names
//! - [`UriResolver`]: identifier <-> link conversion for reference fields
//! - dependency checks guarding deletes

mod dependency;
mod errors;
#[allow(clippy::module_inception)]
mod resource;
mod translate;
mod uri;

use std::fmt;
use std::sync::Arc;

use crate::persistence::Persistence;
use crate::registry::ResourceRegistry;

pub use dependency::{describe_dependencies, DependencyHook, DependencyInfo, UNNAMED};
pub use errors::{Dependency, ResourceError, ResourceResult};
pub use resource::{Resource, SaveOptions, SETTINGS_KEY};
pub use translate::{translate_keys, Direction};
pub use uri::UriResolver;

/// Collaborators every resource needs: storage, the registry used for
/// reference checks, and the scope all rows are partitioned by.
#[derive(Clone)]
pub struct ResourceContext {
    pub store: Arc<dyn Persistence>,
    pub registry: Arc<dyn ResourceRegistry>,
    pub scope_id: i64,
}

impl ResourceContext {
    pub fn new(
        store: Arc<dyn Persistence>,
        registry: Arc<dyn ResourceRegistry>,
        scope_id: i64,
    ) -> Self {
        Self {
            store,
            registry,
            scope_id,
        }
    }
}

impl fmt::Debug for ResourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceContext")
            .field("scope_id", &self.scope_id)
            .finish_non_exhaustive()
    }
}

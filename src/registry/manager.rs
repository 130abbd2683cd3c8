//! Catalog-backed resource manager

use std::sync::Arc;

use tracing::{debug, warn};

use super::ResourceRegistry;
use crate::config::EngineConfig;
use crate::persistence::Persistence;
use crate::resource::{Resource, ResourceContext, ResourceResult};
use crate::schema::{ResourceDef, SchemaCatalog, SchemaResult};

/// Entry point for working with resources of any declared type in one scope.
///
/// Cloning is cheap: the catalog and store are shared.
#[derive(Clone)]
pub struct ResourceManager {
    catalog: Arc<SchemaCatalog>,
    store: Arc<dyn Persistence>,
    scope_id: i64,
}

impl ResourceManager {
    pub fn new(catalog: Arc<SchemaCatalog>, store: Arc<dyn Persistence>, scope_id: i64) -> Self {
        Self {
            catalog,
            store,
            scope_id,
        }
    }

    /// Loads the catalog from the configured schema directory.
    pub fn from_config(config: &EngineConfig, store: Arc<dyn Persistence>) -> SchemaResult<Self> {
        let catalog = SchemaCatalog::load_dir(&config.schema_dir)?;
        Ok(Self::new(Arc::new(catalog), store, config.scope_id))
    }

    /// Context handed to every resource this manager creates
    pub fn context(&self) -> ResourceContext {
        ResourceContext::new(
            Arc::clone(&self.store),
            Arc::new(self.clone()),
            self.scope_id,
        )
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn Persistence> {
        &self.store
    }

    pub fn scope_id(&self) -> i64 {
        self.scope_id
    }

    /// Definition of `resource_type`
    pub fn definition(&self, resource_type: &str) -> ResourceResult<Arc<ResourceDef>> {
        Ok(self.catalog.definition(resource_type)?)
    }

    /// A new, unsaved resource
    pub fn new_resource(&self, resource_type: &str) -> ResourceResult<Resource> {
        Ok(Resource::new(self.definition(resource_type)?, self.context()))
    }

    /// The stored resource with `identifier`
    pub fn get_resource(&self, resource_type: &str, identifier: i64) -> ResourceResult<Resource> {
        Resource::load(self.definition(resource_type)?, self.context(), identifier)
    }

    /// The stored resource with an identifier taken from client input
    pub fn open_resource(&self, resource_type: &str, raw_identifier: &str) -> ResourceResult<Resource> {
        Resource::open(self.definition(resource_type)?, self.context(), raw_identifier)
    }

    /// Identifiers of every `resource_type` row in scope, ordered by the
    /// definition's search field, or by primary key.
    pub fn search(&self, resource_type: &str) -> ResourceResult<Vec<i64>> {
        let def = self.definition(resource_type)?;
        let order_by = def.search_field.as_deref().map(|field| def.column_for(field));
        let keys = self.store.fetch_keys(
            &def.table,
            &def.primary_key,
            self.scope_id,
            order_by.as_deref(),
        )?;
        debug!(resource = resource_type, results = keys.len(), "Search");
        Ok(keys)
    }

    /// Every `resource_type` resource in scope, in search order
    pub fn all_resources(&self, resource_type: &str) -> ResourceResult<Vec<Resource>> {
        self.search(resource_type)?
            .into_iter()
            .map(|identifier| self.get_resource(resource_type, identifier))
            .collect()
    }
}

impl ResourceRegistry for ResourceManager {
    fn exists(&self, resource_type: &str, identifier: i64) -> bool {
        let Some(def) = self.catalog.get(resource_type) else {
            return false;
        };
        match self
            .store
            .fetch_row(&def.table, &def.primary_key, identifier, self.scope_id)
        {
            Ok(row) => row.is_some(),
            Err(e) => {
                warn!(resource = resource_type, identifier, error = %e, "Existence check failed");
                false
            }
        }
    }

    fn resolve(&self, resource_type: &str, identifier: i64) -> ResourceResult<Resource> {
        self.get_resource(resource_type, identifier)
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("resources", &self.catalog.len())
            .field("scope_id", &self.scope_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::schema::{FieldSpec, FieldType, SchemaSection};
    use serde_json::json;

    fn manager() -> ResourceManager {
        let catalog = SchemaCatalog::new(vec![ResourceDef::new(
            "walker",
            "settings_walker",
            "walker_id",
            SchemaSection::new().with("name", FieldSpec::required(FieldType::String)),
        )
        .with_search_field("name")])
        .unwrap();
        let store = MemoryStore::for_catalog(&catalog);
        ResourceManager::new(Arc::new(catalog), Arc::new(store), 1)
    }

    fn create(manager: &ResourceManager, name: &str) -> i64 {
        let mut walker = manager.new_resource("walker").unwrap();
        walker.set_item("name", json!(name));
        walker.save().unwrap()
    }

    #[test]
    fn test_exists() {
        let manager = manager();
        let id = create(&manager, "alpha");
        assert!(manager.exists("walker", id));
        assert!(!manager.exists("walker", id + 1));
        assert!(!manager.exists("nope", id));
    }

    #[test]
    fn test_unknown_resource_type() {
        let manager = manager();
        let err = manager.new_resource("nope").unwrap_err();
        assert_eq!(err.code(), "SCHEMA_UNKNOWN_RESOURCE");
    }

    #[test]
    fn test_search_orders_by_search_field() {
        let manager = manager();
        let c = create(&manager, "charlie");
        let a = create(&manager, "alpha");
        let b = create(&manager, "bravo");
        assert_eq!(manager.search("walker").unwrap(), vec![a, b, c]);

        let names: Vec<_> = manager
            .all_resources("walker")
            .unwrap()
            .iter()
            .map(|r| r.get("name", json!(null)))
            .collect();
        assert_eq!(names, vec![json!("alpha"), json!("bravo"), json!("charlie")]);
    }

    #[test]
    fn test_other_scope_is_invisible() {
        let manager = manager();
        let id = create(&manager, "alpha");
        let other = ResourceManager::new(manager.catalog.clone(), manager.store.clone(), 2);
        assert!(!other.exists("walker", id));
        assert!(other.search("walker").unwrap().is_empty());
    }
}

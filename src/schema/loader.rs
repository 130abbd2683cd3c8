//! Schema catalog: the immutable registry of resource definitions
//!
//! Definitions are loaded once at startup, one JSON file per resource type.
//! Once built, the catalog is never mutated; it is shared behind an `Arc`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::errors::{SchemaError, SchemaResult};
use super::types::{Dependent, ResourceDef};

/// Immutable registry of resource definitions keyed by resource type name.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    definitions: BTreeMap<String, Arc<ResourceDef>>,
}

impl SchemaCatalog {
    /// Builds a catalog from definitions.
    ///
    /// Fails if a name is registered twice, a definition is structurally
    /// invalid, or a field references an undeclared resource type. Reverse
    /// references are linked into each target's `dependents`.
    pub fn new(definitions: impl IntoIterator<Item = ResourceDef>) -> SchemaResult<Self> {
        let mut pending: BTreeMap<String, ResourceDef> = BTreeMap::new();
        for def in definitions {
            def.validate_structure()
                .map_err(|e| SchemaError::malformed(def.name.clone(), e))?;
            if pending.contains_key(&def.name) {
                return Err(SchemaError::duplicate(&def.name));
            }
            pending.insert(def.name.clone(), def);
        }

        let links = Self::reverse_references(&pending)?;
        for (target, dependent) in links {
            if let Some(def) = pending.get_mut(&target) {
                def.dependents.push(dependent);
            }
        }

        let definitions = pending
            .into_iter()
            .map(|(name, def)| (name, Arc::new(def)))
            .collect();
        Ok(Self { definitions })
    }

    /// Loads every `*.json` definition file in `dir`.
    pub fn load_dir(dir: &Path) -> SchemaResult<Self> {
        let entries = fs::read_dir(dir).map_err(|e| {
            SchemaError::malformed(
                dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::malformed(
                    dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            paths.push(path);
        }
        // read_dir order is platform dependent
        paths.sort();

        let mut definitions = Vec::with_capacity(paths.len());
        for path in &paths {
            definitions.push(Self::load_definition_file(path)?);
        }

        let catalog = Self::new(definitions)?;
        info!(dir = %dir.display(), resources = catalog.len(), "Schema catalog loaded");
        Ok(catalog)
    }

    fn load_definition_file(path: &Path) -> SchemaResult<ResourceDef> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Failed to read file: {}", e))
        })?;

        let def: ResourceDef = serde_json::from_str(&content).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Invalid JSON: {}", e))
        })?;
        debug!(resource = %def.name, path = %path.display(), "Loaded definition");
        Ok(def)
    }

    /// For every reference field, the (target, dependent) pair it produces.
    fn reverse_references(
        pending: &BTreeMap<String, ResourceDef>,
    ) -> SchemaResult<Vec<(String, Dependent)>> {
        let mut links = Vec::new();
        for def in pending.values() {
            let sections = std::iter::once(def.fields.as_ref()).chain(def.settings.as_deref());
            for section in sections {
                for (field, spec) in section.iter() {
                    let Some(target) = &spec.references else {
                        continue;
                    };
                    if !pending.contains_key(target) {
                        return Err(SchemaError::unknown_reference(&def.name, field, target));
                    }
                    links.push((
                        target.clone(),
                        Dependent {
                            resource_type: def.name.clone(),
                            table: def.table.clone(),
                            primary_key: def.primary_key.clone(),
                            column: def.column_for(field),
                        },
                    ));
                }
            }
        }
        Ok(links)
    }

    /// Gets a definition by resource type name.
    pub fn get(&self, resource_type: &str) -> Option<Arc<ResourceDef>> {
        self.definitions.get(resource_type).cloned()
    }

    /// Gets a definition, failing for undeclared resource types.
    pub fn definition(&self, resource_type: &str) -> SchemaResult<Arc<ResourceDef>> {
        self.get(resource_type)
            .ok_or_else(|| SchemaError::unknown_resource(resource_type))
    }

    /// Checks if a resource type is declared.
    pub fn contains(&self, resource_type: &str) -> bool {
        self.definitions.contains_key(resource_type)
    }

    /// Declared resource type names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Returns the number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

//! Dependency checks for deletes
//!
//! By default a resource's dependents are found by scanning the tables of the
//! resource types that reference it, as linked by the schema catalog. A
//! definition can replace the scan with a [`DependencyHook`].

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::errors::{Dependency, ResourceResult};
use super::resource::Resource;
use super::uri::UriResolver;
use crate::persistence::Persistence;
use crate::registry::ResourceRegistry;
use crate::schema::ResourceDef;
use crate::tracker::parse_identifier;

/// Display name used when a dependent type has no name field
pub const UNNAMED: &str = "TBD";

/// Custom dependency lookup for one resource type.
pub trait DependencyHook: Send + Sync + fmt::Debug {
    /// Resources that must be removed or re-pointed before `resource` can
    /// be deleted.
    fn dependencies(&self, resource: &Resource) -> ResourceResult<Vec<Dependency>>;
}

/// Rows of every dependent table whose reference column points at
/// `identifier`, either directly or as a list member.
pub(crate) fn scan_dependents(
    def: &ResourceDef,
    store: &dyn Persistence,
    scope_id: i64,
    identifier: i64,
) -> ResourceResult<Vec<Dependency>> {
    let mut found = Vec::new();
    for dependent in &def.dependents {
        for row in store.fetch_rows(&dependent.table, scope_id)? {
            if !refers_to(row.get(&dependent.column), identifier) {
                continue;
            }
            if let Some(id) = row.get(&dependent.primary_key).and_then(parse_identifier) {
                found.push(Dependency::new(dependent.resource_type.clone(), id));
            }
        }
    }
    found.sort();
    found.dedup();
    debug!(resource = %def.name, identifier, dependents = found.len(), "Dependency scan");
    Ok(found)
}

fn refers_to(value: Option<&Value>, identifier: i64) -> bool {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| parse_identifier(item) == Some(identifier)),
        Some(value) => parse_identifier(value) == Some(identifier),
        None => false,
    }
}

/// A dependent as shown to API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyInfo {
    pub name: String,
    pub uri: String,
}

/// Resolves each dependency to its display name and link.
pub fn describe_dependencies(
    registry: &dyn ResourceRegistry,
    uri: &UriResolver,
    dependencies: &[Dependency],
) -> ResourceResult<Vec<DependencyInfo>> {
    dependencies
        .iter()
        .map(|dep| -> ResourceResult<DependencyInfo> {
            let resource = registry.resolve(&dep.resource_type, dep.identifier)?;
            let name = resource
                .definition()
                .name_field
                .as_deref()
                .and_then(|field| resource.get_item(field).ok())
                .map(|value| match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| UNNAMED.to_string());
            Ok(DependencyInfo {
                name,
                uri: uri.link_for(&dep.resource_type, dep.identifier),
            })
        })
        .collect()
}

//! Resource Lifecycle Tests
//!
//! - Save validates first and writes nothing while issues remain
//! - Load defers reference checks until the record is materialized
//! - Delete is blocked by dependents and issues no storage delete
//! - Storage rejections surface as SaveIssue
//! - Catalog and config loading from disk

use std::fs;
use std::path::Path;
use std::sync::Arc;

use restrack::persistence::{MemoryStore, Persistence, TableSpec};
use restrack::resource::{
    describe_dependencies, Dependency, DependencyHook, Resource, ResourceError, ResourceResult,
    SaveOptions, UriResolver,
};
use restrack::schema::{FieldSpec, FieldType, ResourceDef, SchemaCatalog, SchemaSection};
use restrack::tracker::IssueKind;
use restrack::{EngineConfig, ResourceManager};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn write_schemas(dir: &Path) {
    let walker = json!({
        "name": "walker",
        "table": "settings_walker",
        "primary_key": "walker_id",
        "name_field": "walkername",
        "search_field": "walkername",
        "fields": {
            "walkername": {"expected": "str", "require": true},
            "setup": {"expected": "list", "references": "walkerarea", "uri": true}
        }
    });
    let walkerarea = json!({
        "name": "walkerarea",
        "table": "settings_walkerarea",
        "primary_key": "walkerarea_id",
        "name_field": "name",
        "translations": {"area": "area_id"},
        "fields": {
            "name": {"expected": "str", "require": true},
            "area": {"expected": "int", "require": true, "references": "area", "uri": true},
            "algo_type": {"expected": "str", "require": true, "empty": "coords"}
        }
    });
    let area = json!({
        "name": "area",
        "table": "settings_area",
        "primary_key": "area_id",
        "name_field": "name",
        "fields": {
            "name": {"expected": "str", "require": true},
            "enabled": {"expected": "bool"}
        },
        "settings": {
            "speed": {"expected": "float"},
            "mon_ids": {"expected": "list"}
        }
    });
    fs::write(dir.join("walker.json"), walker.to_string()).unwrap();
    fs::write(dir.join("walkerarea.json"), walkerarea.to_string()).unwrap();
    fs::write(dir.join("area.json"), area.to_string()).unwrap();
    fs::write(dir.join("README.txt"), "not a schema").unwrap();
}

fn setup_manager() -> (TempDir, Arc<MemoryStore>, ResourceManager) {
    let tmp = TempDir::new().unwrap();
    write_schemas(tmp.path());
    let catalog = SchemaCatalog::load_dir(tmp.path()).unwrap();
    let store = Arc::new(MemoryStore::for_catalog(&catalog));
    let manager = ResourceManager::new(Arc::new(catalog), store.clone(), 1);
    (tmp, store, manager)
}

fn mapping(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn create_area(manager: &ResourceManager, name: &str) -> i64 {
    let mut area = manager.new_resource("area").unwrap();
    area.update(vec![mapping(json!({"name": name}))], false);
    area.save().unwrap()
}

fn create_walkerarea(manager: &ResourceManager, name: &str, area: i64) -> i64 {
    let mut walkerarea = manager.new_resource("walkerarea").unwrap();
    walkerarea.update(vec![mapping(json!({"name": name, "area": area}))], false);
    walkerarea.save().unwrap()
}

// =============================================================================
// End-to-End Tests
// =============================================================================

/// Construct, update, save, read back, then clear a required field.
#[test]
fn test_end_to_end_name_rank() {
    let def = ResourceDef::new(
        "walker",
        "settings_walker",
        "walker_id",
        SchemaSection::new()
            .with("name", FieldSpec::required(FieldType::String))
            .with("rank", FieldSpec::optional(FieldType::Int)),
    );
    let catalog = Arc::new(SchemaCatalog::new(vec![def]).unwrap());
    let store = Arc::new(MemoryStore::for_catalog(&catalog));
    let manager = ResourceManager::new(catalog, store, 1);

    let mut resource = manager.new_resource("walker").unwrap();
    resource.update(vec![mapping(json!({"name": "alpha"}))], false);
    let id = resource.save().unwrap();
    assert_eq!(resource.identifier(), Some(id));
    assert_eq!(resource.get_item("name").unwrap(), json!("alpha"));

    resource.delete_item("name");
    let err = resource.presave_validation(&[]).unwrap_err();
    let issues = err.issues().unwrap();
    assert_eq!(issues.missing, vec!["name".to_string()]);
    assert_eq!(
        serde_json::to_value(issues).unwrap(),
        json!({"missing": ["name"]})
    );
}

/// A saved resource loads back with the same public values.
#[test]
fn test_save_and_load_round_trip() {
    let (_tmp, store, manager) = setup_manager();
    let mut area = manager.new_resource("area").unwrap();
    area.update(
        vec![mapping(json!({
            "name": "downtown",
            "enabled": "True",
            "settings": {"speed": "12.5", "mon_ids": [1, 2]}
        }))],
        false,
    );
    let id = area.save().unwrap();

    let loaded = manager.get_resource("area", id).unwrap();
    assert_eq!(
        loaded.to_value(),
        json!({
            "name": "downtown",
            "enabled": true,
            "settings": {"speed": 12.5, "mon_ids": [1, 2]}
        })
    );
    assert_eq!(store.row_count("settings_area").unwrap(), 1);
}

/// Translated columns are stored under the storage name.
#[test]
fn test_translation_applies_to_storage() {
    let (_tmp, store, manager) = setup_manager();
    let area = create_area(&manager, "downtown");
    let id = create_walkerarea(&manager, "first", area);

    let row = store
        .fetch_row("settings_walkerarea", "walkerarea_id", id, 1)
        .unwrap()
        .unwrap();
    assert_eq!(row.get("area_id"), Some(&json!(area)));
    assert_eq!(row.get("algo_type"), Some(&json!("coords")));
    assert!(row.get("area").is_none());

    let loaded = manager.get_resource("walkerarea", id).unwrap();
    assert_eq!(loaded.get_item("area").unwrap(), json!(area));
}

// =============================================================================
// Save Atomicity Tests
// =============================================================================

/// Any issue at save time means no storage write and no identifier.
#[test]
fn test_save_aborts_without_write() {
    let (_tmp, store, manager) = setup_manager();
    let mut walkerarea = manager.new_resource("walkerarea").unwrap();
    walkerarea.update(vec![mapping(json!({"name": "first", "area": 404}))], false);

    let before = store.write_count();
    let err = walkerarea.save().unwrap_err();
    assert_eq!(err.code(), "UPDATE_ISSUE");
    assert!(err.issues().unwrap().contains(IssueKind::InvalidReference, "area"));
    assert_eq!(store.write_count(), before);
    assert!(walkerarea.identifier().is_none());
}

/// Ignored categories do not block the save.
#[test]
fn test_save_ignoring_unknown() {
    let (_tmp, _store, manager) = setup_manager();
    let mut area = manager.new_resource("area").unwrap();
    area.update(vec![mapping(json!({"name": "downtown", "colour": "red"}))], false);
    assert!(area.save().is_err());

    let options = SaveOptions::default().ignoring(IssueKind::Unknown);
    assert!(area.save_with(options).is_ok());
}

/// Ignoring invalid values does not let a required field be saved without one.
#[test]
fn test_ignoring_invalid_still_requires_value() {
    let (_tmp, store, manager) = setup_manager();
    let mut area = manager.new_resource("area").unwrap();
    area.set_item("name", json!([1]));

    let before = store.write_count();
    let err = area
        .save_with(SaveOptions::default().ignoring(IssueKind::Invalid))
        .unwrap_err();
    assert_eq!(err.code(), "UPDATE_ISSUE");
    assert!(err.issues().unwrap().contains(IssueKind::Missing, "name"));
    assert_eq!(store.write_count(), before);
    assert!(area.identifier().is_none());
}

/// Constraint violations surface as SaveIssue.
#[test]
fn test_constraint_violation_is_save_issue() {
    let (_tmp, store, manager) = setup_manager();
    store
        .create_table(TableSpec::new("settings_area", "area_id").with_unique(&["instance_id", "name"]))
        .unwrap();
    create_area(&manager, "downtown");

    let mut duplicate = manager.new_resource("area").unwrap();
    duplicate.set_item("name", json!("downtown"));
    let err = duplicate.save().unwrap_err();
    assert!(matches!(err, ResourceError::SaveIssue(ref e) if e.is_constraint_violation()));
    assert!(duplicate.identifier().is_none());
}

/// Forced inserts upsert onto the colliding row.
#[test]
fn test_force_insert_upserts() {
    let (_tmp, store, manager) = setup_manager();
    store
        .create_table(TableSpec::new("settings_area", "area_id").with_unique(&["instance_id", "name"]))
        .unwrap();
    let id = create_area(&manager, "downtown");

    let mut replacement = manager.new_resource("area").unwrap();
    replacement.update(vec![mapping(json!({"name": "downtown", "enabled": true}))], false);
    let written = replacement
        .save_with(SaveOptions::default().force_insert())
        .unwrap();
    assert_eq!(written, id);
    assert_eq!(store.row_count("settings_area").unwrap(), 1);
    let loaded = manager.get_resource("area", id).unwrap();
    assert_eq!(loaded.get_item("enabled").unwrap(), json!(true));
}

// =============================================================================
// Load Tests
// =============================================================================

/// Bad references in stored rows are only reported once re-validated.
#[test]
fn test_load_defers_reference_checks() {
    let (_tmp, store, manager) = setup_manager();
    let row = mapping(json!({
        "name": "orphan",
        "area_id": 99,
        "algo_type": "coords",
        "instance_id": 1
    }));
    let id = store.insert("settings_walkerarea", &row).unwrap();

    let mut loaded = manager.get_resource("walkerarea", id).unwrap();
    assert!(loaded.issues().is_empty());

    loaded.set_item("area", json!(99));
    assert!(loaded.issues().contains(IssueKind::InvalidReference, "area"));
}

/// Rows of other scopes are unknown identifiers.
#[test]
fn test_load_is_scoped() {
    let (_tmp, _store, manager) = setup_manager();
    let id = create_area(&manager, "downtown");
    let other = ResourceManager::new(
        Arc::new(manager.catalog().clone()),
        Arc::clone(manager.store()),
        2,
    );
    let err = other.get_resource("area", id).unwrap_err();
    assert_eq!(err.code(), "UNKNOWN_IDENTIFIER");

    let err = manager.open_resource("area", "twelve").unwrap_err();
    assert_eq!(err.code(), "INVALID_IDENTIFIER");
    assert!(manager.open_resource("area", &id.to_string()).is_ok());
}

/// Null settings columns are treated as not configured.
#[test]
fn test_null_settings_not_loaded() {
    let (_tmp, _store, manager) = setup_manager();
    let mut area = manager.new_resource("area").unwrap();
    area.update(vec![mapping(json!({"name": "a", "settings": {"speed": 1.0}}))], false);
    let id = area.save().unwrap();

    area.delete_item("speed");
    area.save().unwrap();

    let loaded = manager.get_resource("area", id).unwrap();
    assert!(!loaded.settings().unwrap().contains("speed"));
    assert!(loaded.settings().unwrap().issues().is_empty());
}

// =============================================================================
// Delete Tests
// =============================================================================

/// Dependents block the delete and nothing is removed.
#[test]
fn test_delete_blocked_by_dependents() {
    let (_tmp, store, manager) = setup_manager();
    let area_id = create_area(&manager, "downtown");
    let walkerarea_id = create_walkerarea(&manager, "first", area_id);

    let area = manager.get_resource("area", area_id).unwrap();
    let writes = store.write_count();
    let err = area.delete().unwrap_err();
    assert_eq!(
        err.dependencies().unwrap(),
        &[Dependency::new("walkerarea", walkerarea_id)]
    );
    assert_eq!(store.write_count(), writes);
    assert!(manager.get_resource("area", area_id).is_ok());

    let described = describe_dependencies(
        &manager,
        &UriResolver::new("/api"),
        err.dependencies().unwrap(),
    )
    .unwrap();
    assert_eq!(described[0].name, "first");
    assert_eq!(described[0].uri, format!("/api/walkerarea/{}", walkerarea_id));
}

/// List columns count as dependents when they contain the identifier.
#[test]
fn test_list_reference_dependents() {
    let (_tmp, _store, manager) = setup_manager();
    let area_id = create_area(&manager, "downtown");
    let walkerarea_id = create_walkerarea(&manager, "first", area_id);

    let mut walker = manager.new_resource("walker").unwrap();
    walker.update(
        vec![mapping(json!({"walkername": "w", "setup": [walkerarea_id]}))],
        false,
    );
    let walker_id = walker.save().unwrap();

    let walkerarea = manager.get_resource("walkerarea", walkerarea_id).unwrap();
    assert_eq!(
        walkerarea.get_dependencies().unwrap(),
        vec![Dependency::new("walker", walker_id)]
    );

    walker.update(vec![mapping(json!({"setup": []}))], false);
    walker.save().unwrap();
    walkerarea.delete().unwrap();
    assert!(manager.get_resource("walkerarea", walkerarea_id).is_err());
}

#[derive(Debug)]
struct AlwaysBlocked;

impl DependencyHook for AlwaysBlocked {
    fn dependencies(&self, resource: &Resource) -> ResourceResult<Vec<Dependency>> {
        Ok(vec![Dependency::new("auditor", resource.identifier().unwrap_or(0))])
    }
}

/// A dependency hook replaces the table scan.
#[test]
fn test_dependency_hook_overrides_scan() {
    let def = ResourceDef::new(
        "area",
        "settings_area",
        "area_id",
        SchemaSection::new().with("name", FieldSpec::required(FieldType::String)),
    )
    .with_dependency_hook(Arc::new(AlwaysBlocked));
    let catalog = SchemaCatalog::new(vec![def]).unwrap();
    let store: Arc<dyn Persistence> = Arc::new(MemoryStore::for_catalog(&catalog));
    let manager = ResourceManager::new(Arc::new(catalog), store, 1);

    let id = create_area(&manager, "downtown");
    let area = manager.get_resource("area", id).unwrap();
    assert!(matches!(area.delete(), Err(ResourceError::DependencyError(deps)) if deps.len() == 1));
}

/// Unsaved resources cannot be deleted.
#[test]
fn test_delete_without_identifier() {
    let (_tmp, _store, manager) = setup_manager();
    let resource = manager.new_resource("area").unwrap();
    assert!(resource.get_dependencies().unwrap().is_empty());
    assert_eq!(resource.delete().unwrap_err().code(), "UNKNOWN_IDENTIFIER");
}

// =============================================================================
// Configuration Tests
// =============================================================================

/// A manager can be built from a config file.
#[test]
fn test_manager_from_config() {
    let tmp = TempDir::new().unwrap();
    let schemas = tmp.path().join("schemas");
    fs::create_dir(&schemas).unwrap();
    write_schemas(&schemas);

    let config_path = tmp.path().join("restrack.json");
    fs::write(
        &config_path,
        json!({"scope_id": 7, "schema_dir": schemas}).to_string(),
    )
    .unwrap();
    let config = EngineConfig::load(&config_path).unwrap();

    let manager = ResourceManager::from_config(&config, Arc::new(MemoryStore::new())).unwrap();
    assert_eq!(manager.scope_id(), 7);
    assert_eq!(manager.catalog().len(), 3);
    assert_eq!(config.uri_resolver().link_for("area", 1), "/api/area/1");
}

//! In-memory storage backend
//!
//! Tables are declared up front with their primary key and unique column
//! groups. Semantics follow a relational store closely enough for the engine:
//! auto-increment keys, unique constraint enforcement, and updates or deletes
//! of missing rows affecting nothing rather than failing.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::{debug, trace};

use super::errors::{PersistenceError, PersistenceResult};
use super::{Persistence, Row, SCOPE_COLUMN};
use crate::schema::SchemaCatalog;

/// Declaration of one in-memory table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name
    pub name: String,
    /// Auto-increment primary key column
    pub primary_key: String,
    /// Column groups whose combined values must be unique
    pub unique: Vec<Vec<String>>,
}

impl TableSpec {
    /// Create a table with only a primary key
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            unique: Vec::new(),
        }
    }

    /// Add a unique constraint over `columns`
    pub fn with_unique(mut self, columns: &[&str]) -> Self {
        self.unique
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }
}

#[derive(Debug)]
struct MemoryTable {
    spec: TableSpec,
    rows: BTreeMap<i64, Row>,
    next_id: i64,
}

impl MemoryTable {
    fn new(spec: TableSpec) -> Self {
        Self {
            spec,
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Name of the unique group `candidate` collides on, ignoring row `exclude`.
    fn conflict(&self, candidate: &Row, exclude: Option<i64>) -> Option<String> {
        self.spec.unique.iter().find_map(|group| {
            let wanted: Option<Vec<&Value>> = group
                .iter()
                .map(|column| candidate.get(column).filter(|v| !v.is_null()))
                .collect();
            let wanted = wanted?;
            let taken = self.rows.iter().any(|(id, row)| {
                Some(*id) != exclude
                    && group
                        .iter()
                        .zip(&wanted)
                        .all(|(column, value)| row.get(column) == Some(*value))
            });
            taken.then(|| group.join(","))
        })
    }

    /// Row `payload` would collide with, by primary key or unique group.
    fn colliding_row(&self, payload: &Row) -> Option<i64> {
        if let Some(id) = payload.get(&self.spec.primary_key).and_then(row_key) {
            if self.rows.contains_key(&id) {
                return Some(id);
            }
        }
        self.spec.unique.iter().find_map(|group| {
            self.rows.iter().find_map(|(id, row)| {
                let all_equal = group.iter().all(|column| match payload.get(column) {
                    Some(value) if !value.is_null() => row.get(column) == Some(value),
                    _ => false,
                });
                all_equal.then_some(*id)
            })
        })
    }

    fn insert_row(&mut self, payload: &Row) -> PersistenceResult<i64> {
        let pk = self.spec.primary_key.clone();
        let id = match payload.get(&pk) {
            None | Some(Value::Null) => self.next_id,
            Some(value) => row_key(value).ok_or_else(|| PersistenceError::InvalidPayload {
                table: self.spec.name.clone(),
                reason: format!("'{}' is not an integer key", pk),
            })?,
        };
        if self.rows.contains_key(&id) {
            return Err(self.violation("PRIMARY"));
        }
        let next = id
            .checked_add(1)
            .ok_or_else(|| PersistenceError::InvalidPayload {
                table: self.spec.name.clone(),
                reason: format!("'{}' exhausts the key space", pk),
            })?;

        let mut row = payload.clone();
        row.insert(pk, Value::from(id));
        if let Some(group) = self.conflict(&row, None) {
            return Err(self.violation(&group));
        }

        self.rows.insert(id, row);
        self.next_id = self.next_id.max(next);
        Ok(id)
    }

    fn merge_row(&mut self, id: i64, payload: &Row) -> PersistenceResult<()> {
        let Some(existing) = self.rows.get(&id) else {
            return Ok(());
        };
        let mut merged = existing.clone();
        for (column, value) in payload {
            merged.insert(column.clone(), value.clone());
        }
        merged.insert(self.spec.primary_key.clone(), Value::from(id));
        if let Some(group) = self.conflict(&merged, Some(id)) {
            return Err(self.violation(&group));
        }
        self.rows.insert(id, merged);
        Ok(())
    }

    fn find(&self, key_column: &str, key_value: i64) -> Option<i64> {
        if key_column == self.spec.primary_key {
            return self.rows.contains_key(&key_value).then_some(key_value);
        }
        self.rows.iter().find_map(|(id, row)| {
            (row.get(key_column).and_then(row_key) == Some(key_value)).then_some(*id)
        })
    }

    fn violation(&self, constraint: &str) -> PersistenceError {
        PersistenceError::ConstraintViolation {
            table: self.spec.name.clone(),
            constraint: constraint.to_string(),
        }
    }
}

/// Integer key stored either as a number or a numeric string.
fn row_key(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Rows without a scope column are visible in every scope.
fn in_scope(row: &Row, scope_id: i64) -> bool {
    match row.get(SCOPE_COLUMN) {
        None | Some(Value::Null) => true,
        Some(value) => row_key(value) == Some(scope_id),
    }
}

/// Compare JSON values for ordering
fn compare_json_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&b.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Null), Some(Value::Null)) => Ordering::Equal,
        // nulls sort first, as in an ascending SQL scan
        (Some(Value::Null), Some(_)) | (None, Some(_)) => Ordering::Less,
        (Some(_), Some(Value::Null)) | (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Thread-safe in-memory [`Persistence`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create a store with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one table per resource definition in `catalog`
    pub fn for_catalog(catalog: &SchemaCatalog) -> Self {
        let mut tables = HashMap::new();
        for name in catalog.names() {
            if let Some(def) = catalog.get(name) {
                let spec = TableSpec::new(def.table.clone(), def.primary_key.clone());
                tables.insert(def.table.clone(), MemoryTable::new(spec));
            }
        }
        Self {
            tables: RwLock::new(tables),
            writes: AtomicUsize::new(0),
        }
    }

    /// Add a table, builder style. Replaces a table of the same name.
    pub fn with_table(self, spec: TableSpec) -> Self {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(spec.name.clone(), MemoryTable::new(spec));
        }
        self
    }

    /// Add or replace a table
    pub fn create_table(&self, spec: TableSpec) -> PersistenceResult<()> {
        let mut tables = self.write_tables()?;
        debug!(table = %spec.name, "Created table");
        tables.insert(spec.name.clone(), MemoryTable::new(spec));
        Ok(())
    }

    /// Number of write statements issued so far
    pub fn write_count(&self) -> usize {
        self.writes.load(AtomicOrdering::SeqCst)
    }

    /// Number of rows in `table`, across every scope
    pub fn row_count(&self, table: &str) -> PersistenceResult<usize> {
        let tables = self.read_tables()?;
        let table = tables
            .get(table)
            .ok_or_else(|| PersistenceError::UnknownTable(table.to_string()))?;
        Ok(table.rows.len())
    }

    fn read_tables(&self) -> PersistenceResult<RwLockReadGuard<'_, HashMap<String, MemoryTable>>> {
        self.tables
            .read()
            .map_err(|_| PersistenceError::Backend("table lock poisoned".into()))
    }

    fn write_tables(&self) -> PersistenceResult<RwLockWriteGuard<'_, HashMap<String, MemoryTable>>> {
        self.tables
            .write()
            .map_err(|_| PersistenceError::Backend("table lock poisoned".into()))
    }

    fn with_table_mut<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut MemoryTable) -> PersistenceResult<T>,
    ) -> PersistenceResult<T> {
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);
        let mut tables = self.write_tables()?;
        let table = tables
            .get_mut(table)
            .ok_or_else(|| PersistenceError::UnknownTable(table.to_string()))?;
        f(table)
    }

    fn with_table_ref<T>(
        &self,
        table: &str,
        f: impl FnOnce(&MemoryTable) -> PersistenceResult<T>,
    ) -> PersistenceResult<T> {
        let tables = self.read_tables()?;
        let table = tables
            .get(table)
            .ok_or_else(|| PersistenceError::UnknownTable(table.to_string()))?;
        f(table)
    }
}

impl Persistence for MemoryStore {
    fn fetch_row(
        &self,
        table: &str,
        key_column: &str,
        key_value: i64,
        scope_id: i64,
    ) -> PersistenceResult<Option<Row>> {
        self.with_table_ref(table, |t| {
            let row = t
                .find(key_column, key_value)
                .and_then(|id| t.rows.get(&id))
                .filter(|row| in_scope(row, scope_id))
                .cloned();
            trace!(table, key_value, found = row.is_some(), "fetch_row");
            Ok(row)
        })
    }

    fn insert(&self, table: &str, payload: &Row) -> PersistenceResult<i64> {
        self.with_table_mut(table, |t| {
            let id = t.insert_row(payload)?;
            debug!(table, id, "Inserted row");
            Ok(id)
        })
    }

    fn update(
        &self,
        table: &str,
        payload: &Row,
        key_column: &str,
        key_value: i64,
    ) -> PersistenceResult<()> {
        self.with_table_mut(table, |t| match t.find(key_column, key_value) {
            Some(id) => {
                t.merge_row(id, payload)?;
                debug!(table, id, "Updated row");
                Ok(())
            }
            None => Ok(()),
        })
    }

    fn delete(
        &self,
        table: &str,
        key_column: &str,
        key_value: i64,
        scope_id: i64,
    ) -> PersistenceResult<()> {
        self.with_table_mut(table, |t| {
            let target = t
                .find(key_column, key_value)
                .filter(|id| t.rows.get(id).map_or(false, |row| in_scope(row, scope_id)));
            if let Some(id) = target {
                t.rows.remove(&id);
                debug!(table, id, "Deleted row");
            }
            Ok(())
        })
    }

    fn upsert(&self, table: &str, payload: &Row) -> PersistenceResult<i64> {
        self.with_table_mut(table, |t| match t.colliding_row(payload) {
            Some(id) => {
                t.merge_row(id, payload)?;
                debug!(table, id, "Upserted existing row");
                Ok(id)
            }
            None => {
                let id = t.insert_row(payload)?;
                debug!(table, id, "Upserted new row");
                Ok(id)
            }
        })
    }

    fn fetch_rows(&self, table: &str, scope_id: i64) -> PersistenceResult<Vec<Row>> {
        self.with_table_ref(table, |t| {
            Ok(t.rows
                .values()
                .filter(|row| in_scope(row, scope_id))
                .cloned()
                .collect())
        })
    }

    fn fetch_keys(
        &self,
        table: &str,
        key_column: &str,
        scope_id: i64,
        order_by: Option<&str>,
    ) -> PersistenceResult<Vec<i64>> {
        self.with_table_ref(table, |t| {
            let mut rows: Vec<&Row> = t.rows.values().filter(|row| in_scope(row, scope_id)).collect();
            if let Some(column) = order_by {
                rows.sort_by(|a, b| compare_json_values(a.get(column), b.get(column)));
            }
            Ok(rows
                .into_iter()
                .filter_map(|row| row.get(key_column).and_then(row_key))
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row fixture must be an object"),
        }
    }

    fn create_store() -> MemoryStore {
        MemoryStore::new().with_table(
            TableSpec::new("settings_walker", "walker_id").with_unique(&["instance_id", "name"]),
        )
    }

    #[test]
    fn test_insert_and_fetch() {
        let store = create_store();
        let id = store
            .insert("settings_walker", &row(json!({"name": "a", "instance_id": 1})))
            .unwrap();
        assert_eq!(id, 1);

        let fetched = store.fetch_row("settings_walker", "walker_id", id, 1).unwrap().unwrap();
        assert_eq!(fetched.get("name"), Some(&json!("a")));
        assert_eq!(fetched.get("walker_id"), Some(&json!(1)));
    }

    #[test]
    fn test_fetch_respects_scope() {
        let store = create_store();
        let id = store
            .insert("settings_walker", &row(json!({"name": "a", "instance_id": 1})))
            .unwrap();
        assert!(store.fetch_row("settings_walker", "walker_id", id, 2).unwrap().is_none());
    }

    #[test]
    fn test_unique_violation() {
        let store = create_store();
        store
            .insert("settings_walker", &row(json!({"name": "a", "instance_id": 1})))
            .unwrap();
        let err = store
            .insert("settings_walker", &row(json!({"name": "a", "instance_id": 1})))
            .unwrap_err();
        assert!(err.is_constraint_violation());

        // same name in another scope is fine
        store
            .insert("settings_walker", &row(json!({"name": "a", "instance_id": 2})))
            .unwrap();
    }

    #[test]
    fn test_update_merges_columns() {
        let store = create_store();
        let id = store
            .insert("settings_walker", &row(json!({"name": "a", "rank": 1, "instance_id": 1})))
            .unwrap();
        store
            .update("settings_walker", &row(json!({"rank": null})), "walker_id", id)
            .unwrap();
        let fetched = store.fetch_row("settings_walker", "walker_id", id, 1).unwrap().unwrap();
        assert_eq!(fetched.get("name"), Some(&json!("a")));
        assert_eq!(fetched.get("rank"), Some(&Value::Null));
    }

    #[test]
    fn test_update_missing_row_is_noop() {
        let store = create_store();
        store
            .update("settings_walker", &row(json!({"name": "x"})), "walker_id", 42)
            .unwrap();
        assert_eq!(store.row_count("settings_walker").unwrap(), 0);
    }

    #[test]
    fn test_upsert_on_unique_group() {
        let store = create_store();
        let id = store
            .insert("settings_walker", &row(json!({"name": "a", "rank": 1, "instance_id": 1})))
            .unwrap();
        let upserted = store
            .upsert("settings_walker", &row(json!({"name": "a", "rank": 5, "instance_id": 1})))
            .unwrap();
        assert_eq!(upserted, id);
        assert_eq!(store.row_count("settings_walker").unwrap(), 1);

        let fresh = store
            .upsert("settings_walker", &row(json!({"name": "b", "instance_id": 1})))
            .unwrap();
        assert_ne!(fresh, id);
    }

    #[test]
    fn test_delete_scoped() {
        let store = create_store();
        let id = store
            .insert("settings_walker", &row(json!({"name": "a", "instance_id": 1})))
            .unwrap();
        store.delete("settings_walker", "walker_id", id, 2).unwrap();
        assert_eq!(store.row_count("settings_walker").unwrap(), 1);
        store.delete("settings_walker", "walker_id", id, 1).unwrap();
        assert_eq!(store.row_count("settings_walker").unwrap(), 0);
    }

    #[test]
    fn test_fetch_keys_ordered() {
        let store = create_store();
        for name in ["charlie", "alpha", "bravo"] {
            store
                .insert("settings_walker", &row(json!({"name": name, "instance_id": 1})))
                .unwrap();
        }
        let keys = store
            .fetch_keys("settings_walker", "walker_id", 1, Some("name"))
            .unwrap();
        assert_eq!(keys, vec![2, 3, 1]);
        let keys = store.fetch_keys("settings_walker", "walker_id", 1, None).unwrap();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn test_unknown_table() {
        let store = MemoryStore::new();
        let err = store.insert("nope", &Row::new()).unwrap_err();
        assert_eq!(err, PersistenceError::UnknownTable("nope".into()));
    }

    #[test]
    fn test_write_counter() {
        let store = create_store();
        assert_eq!(store.write_count(), 0);
        store
            .insert("settings_walker", &row(json!({"name": "a", "instance_id": 1})))
            .unwrap();
        store.fetch_rows("settings_walker", 1).unwrap();
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_key_overflow_rejected() {
        let store = create_store();
        let result = store.upsert(
            "settings_walker",
            &row(json!({"walker_id": i64::MAX, "name": "z", "instance_id": 1})),
        );
        assert!(matches!(result, Err(PersistenceError::InvalidPayload { .. })));
        assert_eq!(store.row_count("settings_walker").unwrap(), 0);

        let id = store
            .insert("settings_walker", &row(json!({"name": "a", "instance_id": 1})))
            .unwrap();
        assert_eq!(id, 1);
    }
}

//! Resource lifecycle
//!
//! A [`Resource`] composes the fields tracker and, when the definition has a
//! settings section, a settings tracker. It is constructed fresh or loaded
//! from storage, mutated through item operations, then saved (validate, then
//! translate, then one write) or deleted (dependency check, then one delete).

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::dependency::scan_dependents;
use super::errors::{Dependency, ResourceError, ResourceResult};
use super::translate::{translate_keys, Direction};
use super::ResourceContext;
use crate::persistence::{Row, SCOPE_COLUMN};
use crate::schema::ResourceDef;
use crate::tracker::{IssueKind, Issues, Tracker};

/// Key under which the settings sub-mapping is exposed
pub const SETTINGS_KEY: &str = "settings";

/// Options for [`Resource::save_with`]
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Write with upsert semantics instead of insert / update
    pub force_insert: bool,
    /// Issue categories that do not block the save
    pub ignore: Vec<IssueKind>,
}

impl SaveOptions {
    pub fn force_insert(mut self) -> Self {
        self.force_insert = true;
        self
    }

    pub fn ignoring(mut self, kind: IssueKind) -> Self {
        self.ignore.push(kind);
        self
    }
}

/// One record of a declared resource type.
#[derive(Debug)]
pub struct Resource {
    def: Arc<ResourceDef>,
    ctx: ResourceContext,
    identifier: Option<i64>,
    fields: Tracker,
    settings: Option<Tracker>,
}

impl Resource {
    /// Creates a new, unsaved resource with schema defaults applied.
    pub fn new(def: Arc<ResourceDef>, ctx: ResourceContext) -> Self {
        let mut resource = Self::blank(def, ctx);
        resource.finish_construction();
        resource
    }

    /// Loads the resource stored under `identifier` in the context's scope.
    pub fn load(def: Arc<ResourceDef>, ctx: ResourceContext, identifier: i64) -> ResourceResult<Self> {
        let mut resource = Self::blank(def, ctx);
        resource.identifier = Some(identifier);
        resource.load_row()?;
        resource.finish_construction();
        Ok(resource)
    }

    /// Like [`Resource::load`], for an identifier that has not been parsed yet.
    pub fn open(def: Arc<ResourceDef>, ctx: ResourceContext, raw_identifier: &str) -> ResourceResult<Self> {
        let identifier = raw_identifier
            .trim()
            .parse::<i64>()
            .map_err(|_| ResourceError::InvalidIdentifier(raw_identifier.to_string()))?;
        Self::load(def, ctx, identifier)
    }

    fn blank(def: Arc<ResourceDef>, ctx: ResourceContext) -> Self {
        let registry = Arc::clone(&ctx.registry);
        let fields = Tracker::new(Arc::clone(&def.fields), Arc::clone(&registry), Map::new());
        let settings = def
            .settings
            .as_ref()
            .map(|section| Tracker::new(Arc::clone(section), registry, Map::new()));
        Self {
            def,
            ctx,
            identifier: None,
            fields,
            settings,
        }
    }

    fn finish_construction(&mut self) {
        self.fields.enable_reference_checks();
        if let Some(settings) = self.settings.as_mut() {
            settings.enable_reference_checks();
        }
        // identity columns, not data
        self.fields.discard(&self.def.primary_key);
        self.fields.discard(SCOPE_COLUMN);
    }

    fn load_row(&mut self) -> ResourceResult<()> {
        let identifier = self.require_identifier()?;
        let row = self
            .ctx
            .store
            .fetch_row(&self.def.table, &self.def.primary_key, identifier, self.ctx.scope_id)?
            .ok_or_else(|| ResourceError::unknown_identifier(&self.def.name, Some(identifier)))?;

        let row = translate_keys(row, Direction::Load, &self.def.translations);
        for (key, value) in row {
            match self.settings.as_mut() {
                Some(settings) if settings.section().contains(&key) => {
                    // an unset settings column means "not configured"
                    if !value.is_null() {
                        settings.set(&key, value);
                    }
                }
                _ if self.fields.section().contains(&key) => self.fields.set(&key, value),
                _ => {}
            }
        }
        info!(resource = %self.def.name, identifier, "Loaded resource");
        Ok(())
    }

    fn require_identifier(&self) -> ResourceResult<i64> {
        self.identifier
            .ok_or_else(|| ResourceError::unknown_identifier(&self.def.name, None))
    }

    fn tracker(&self, key: &str) -> &Tracker {
        match self.settings.as_ref() {
            Some(settings) if self.def.is_setting(key) => settings,
            _ => &self.fields,
        }
    }

    fn tracker_mut(&mut self, key: &str) -> &mut Tracker {
        match self.settings.as_mut() {
            Some(settings) if self.def.is_setting(key) => settings,
            _ => &mut self.fields,
        }
    }

    /// Value of `key`, or the whole settings object for `"settings"`.
    pub fn get_item(&self, key: &str) -> ResourceResult<Value> {
        if key == SETTINGS_KEY {
            if let Some(settings) = &self.settings {
                return Ok(Value::Object(settings.values().clone()));
            }
        }
        self.tracker(key)
            .get(key)
            .cloned()
            .ok_or_else(|| ResourceError::KeyNotFound(key.to_string()))
    }

    /// Value of `key`, or `default` when it has none.
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.get_item(key).unwrap_or(default)
    }

    /// Writes `key`. An object under `"settings"` updates the settings
    /// section; undeclared keys are recorded as unknown.
    pub fn set_item(&mut self, key: &str, value: Value) {
        match value {
            Value::Object(nested) if key == SETTINGS_KEY && self.settings.is_some() => {
                if let Some(settings) = self.settings.as_mut() {
                    settings.update(nested);
                }
            }
            value => self.tracker_mut(key).set(key, value),
        }
    }

    /// Clears `key`.
    pub fn delete_item(&mut self, key: &str) {
        if key == SETTINGS_KEY {
            return;
        }
        let declared = self.def.is_setting(key) || self.def.fields.contains(key);
        if declared {
            self.tracker_mut(key).delete(key);
        } else if self.fields.forget_unknown(key) {
            debug!(resource = %self.def.name, field = key, "Dropped unknown field");
        }
    }

    /// Applies every pair of every mapping, in order.
    ///
    /// A `"settings"` object is applied to the settings section pair by pair.
    /// With `append`, list values extend the current list instead of
    /// replacing it.
    pub fn update<I>(&mut self, mappings: I, append: bool)
    where
        I: IntoIterator<Item = Map<String, Value>>,
    {
        for mapping in mappings {
            for (key, value) in mapping {
                match value {
                    Value::Object(nested) if key == SETTINGS_KEY && self.settings.is_some() => {
                        if let Some(settings) = self.settings.as_mut() {
                            for (setting, value) in nested {
                                Self::write(settings, &setting, value, append);
                            }
                        }
                    }
                    value => {
                        let tracker = self.tracker_mut(&key);
                        Self::write(tracker, &key, value, append);
                    }
                }
            }
        }
    }

    fn write(tracker: &mut Tracker, key: &str, value: Value, append: bool) {
        let value = match value {
            Value::Array(items) if append => {
                let mut combined = match tracker.get(key) {
                    Some(Value::Array(existing)) => existing.clone(),
                    _ => Vec::new(),
                };
                combined.extend(items);
                Value::Array(combined)
            }
            other => other,
        };
        tracker.set(key, value);
    }

    /// All current issues of both sections
    pub fn issues(&self) -> Issues {
        self.collect_issues(&[])
    }

    fn collect_issues(&self, ignore: &[IssueKind]) -> Issues {
        let mut issues = Issues::default();
        issues.merge(self.fields.issues(), ignore);
        if let Some(settings) = &self.settings {
            issues.merge(settings.issues(), ignore);
        }
        issues
    }

    /// Fails with [`ResourceError::UpdateIssue`] if any issue outside
    /// `ignore` remains.
    pub fn presave_validation(&self, ignore: &[IssueKind]) -> ResourceResult<()> {
        let issues = self.collect_issues(ignore);
        if issues.is_empty() {
            return Ok(());
        }
        warn!(resource = %self.def.name, identifier = ?self.identifier, %issues, "Save rejected");
        Err(ResourceError::UpdateIssue(issues))
    }

    /// Validates and writes the resource, returning its identifier.
    pub fn save(&mut self) -> ResourceResult<i64> {
        self.save_with(SaveOptions::default())
    }

    /// [`Resource::save`] with explicit options.
    pub fn save_with(&mut self, options: SaveOptions) -> ResourceResult<i64> {
        self.presave_validation(&options.ignore)?;

        let mut payload = self.build_payload();
        if let (Some(identifier), true) = (self.identifier, options.force_insert) {
            payload.insert(self.def.primary_key.clone(), Value::from(identifier));
        }

        let store = &self.ctx.store;
        let table = self.def.table.as_str();
        let written = match (self.identifier, options.force_insert) {
            (_, true) => store.upsert(table, &payload),
            (Some(identifier), false) => store
                .update(table, &payload, &self.def.primary_key, identifier)
                .map(|_| identifier),
            (None, false) => store.insert(table, &payload),
        };

        let identifier = written.map_err(|e| {
            warn!(resource = %self.def.name, error = %e, "Storage rejected save");
            ResourceError::SaveIssue(e)
        })?;

        self.identifier = Some(identifier);
        self.fields.take_removed();
        if let Some(settings) = self.settings.as_mut() {
            settings.take_removed();
        }
        info!(resource = %self.def.name, identifier, "Saved resource");
        Ok(identifier)
    }

    /// Storage payload: current values, nulls for removed fields, scope.
    fn build_payload(&self) -> Row {
        let mut payload = Row::new();
        let trackers = std::iter::once(&self.fields).chain(self.settings.as_ref());
        for tracker in trackers {
            for (key, value) in tracker.values() {
                payload.insert(key.clone(), value.clone());
            }
            for key in tracker.removed() {
                payload.insert(key.to_string(), Value::Null);
            }
        }
        if self.def.include_scope {
            payload.insert(SCOPE_COLUMN.to_string(), Value::from(self.ctx.scope_id));
        }
        translate_keys(payload, Direction::Save, &self.def.translations)
    }

    /// Removes the stored row, unless other resources still refer to it.
    pub fn delete(&self) -> ResourceResult<()> {
        let identifier = self.require_identifier()?;
        let dependencies = self.get_dependencies()?;
        if !dependencies.is_empty() {
            warn!(
                resource = %self.def.name,
                identifier,
                dependents = dependencies.len(),
                "Delete blocked by dependents"
            );
            return Err(ResourceError::DependencyError(dependencies));
        }
        self.ctx.store.delete(
            &self.def.table,
            &self.def.primary_key,
            identifier,
            self.ctx.scope_id,
        )?;
        info!(resource = %self.def.name, identifier, "Deleted resource");
        Ok(())
    }

    /// Resources that refer to this one. Empty for unsaved resources.
    pub fn get_dependencies(&self) -> ResourceResult<Vec<Dependency>> {
        let Some(identifier) = self.identifier else {
            return Ok(Vec::new());
        };
        match self.def.dependency_hook() {
            Some(hook) => hook.dependencies(self),
            None => scan_dependents(&self.def, self.ctx.store.as_ref(), self.ctx.scope_id, identifier),
        }
    }

    /// Public keys: stored fields, plus `"settings"` when the section exists
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.fields.values().keys().cloned().collect();
        if self.settings.is_some() {
            keys.push(SETTINGS_KEY.to_string());
        }
        keys
    }

    /// Public key / value pairs, in [`Resource::keys`] order
    pub fn items(&self) -> Vec<(String, Value)> {
        match self.to_value() {
            Value::Object(map) => map.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` currently has a value
    pub fn contains(&self, key: &str) -> bool {
        if key == SETTINGS_KEY {
            return self.settings.is_some();
        }
        self.tracker(key).contains(key)
    }

    /// Public representation: fields at the top level, settings nested.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.values().clone();
        if let Some(settings) = &self.settings {
            map.insert(SETTINGS_KEY.to_string(), Value::Object(settings.values().clone()));
        }
        Value::Object(map)
    }

    pub fn identifier(&self) -> Option<i64> {
        self.identifier
    }

    /// Binds the resource to an existing identifier without loading it.
    pub fn set_identifier(&mut self, identifier: i64) {
        self.identifier = Some(identifier);
    }

    pub fn definition(&self) -> &Arc<ResourceDef> {
        &self.def
    }

    pub fn resource_type(&self) -> &str {
        &self.def.name
    }

    pub fn scope_id(&self) -> i64 {
        self.ctx.scope_id
    }

    pub fn fields(&self) -> &Tracker {
        &self.fields
    }

    pub fn settings(&self) -> Option<&Tracker> {
        self.settings.as_ref()
    }
}

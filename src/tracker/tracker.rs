//! Schema-bound tracked mapping
//!
//! Every write goes through [`Tracker::set`]: unknown keys are recorded and
//! dropped, values are coerced to the expected type, required fields are
//! checked for emptiness, and reference fields are resolved against the
//! registry once reference checks are enabled. Failures accumulate as
//! [`Issues`] instead of aborting the write path.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::coerce::{coerce, is_zero_length, parse_identifier};
use super::issues::{InvalidReference, IssueKind, Issues, ReferenceFault};
use crate::registry::ResourceRegistry;
use crate::schema::{FieldSpec, SchemaSection};

/// A validated mapping of field name to value bound to one schema section.
pub struct Tracker {
    section: Arc<SchemaSection>,
    registry: Arc<dyn ResourceRegistry>,
    values: Map<String, Value>,
    issues: Issues,
    removed: BTreeSet<String>,
    reference_checks: bool,
}

impl Tracker {
    /// Creates a tracker seeded with the section's defaults, then applies
    /// `initial` as individual writes.
    ///
    /// Reference checks start disabled. Undeclared keys in `initial` are
    /// dropped without being recorded as unknown.
    pub fn new(
        section: Arc<SchemaSection>,
        registry: Arc<dyn ResourceRegistry>,
        initial: Map<String, Value>,
    ) -> Self {
        let mut tracker = Self {
            section: Arc::clone(&section),
            registry,
            values: Map::new(),
            issues: Issues::default(),
            removed: BTreeSet::new(),
            reference_checks: false,
        };

        for (field, spec) in section.iter() {
            if let (true, Some(empty)) = (spec.required, &spec.empty) {
                tracker.values.insert(field.clone(), empty.clone());
            }
        }

        for (key, value) in &initial {
            tracker.apply(key, value.clone(), false);
        }

        for (field, spec) in section.iter() {
            if spec.required && !spec.has_empty() && !initial.contains_key(field) {
                tracker.issues.record_missing(field);
            }
        }

        tracker
    }

    /// Validates, coerces and stores `value` under `key`.
    pub fn set(&mut self, key: &str, value: Value) {
        self.apply(key, value, true);
    }

    /// Applies every pair of `values` in order.
    pub fn update(&mut self, values: Map<String, Value>) {
        for (key, value) in values {
            self.set(&key, value);
        }
    }

    fn apply(&mut self, key: &str, value: Value, record_unknown: bool) {
        let section = Arc::clone(&self.section);
        let Some(spec) = section.get(key) else {
            if record_unknown {
                debug!(field = key, "Undeclared field ignored");
                self.issues.record_unknown(key);
            }
            return;
        };

        let Some(value) = Self::conform(spec, value) else {
            debug!(field = key, expected = %spec.expected, "Rejected value");
            // nothing was stored, so a required field without a usable
            // value stays missing
            let unset = self.values.get(key).map_or(true, is_zero_length);
            if spec.required && !spec.has_empty() && unset {
                self.issues.record_missing(key);
            } else {
                self.issues.clear(IssueKind::Missing, key);
            }
            self.issues.clear(IssueKind::InvalidReference, key);
            self.issues.record_invalid(key, spec.expected.label());
            return;
        };

        let mut value = value;
        let mut missing = false;
        if spec.required && is_zero_length(&value) {
            match &spec.empty {
                Some(empty) => value = empty.clone(),
                None => missing = true,
            }
        }

        let bad_reference = match (&spec.references, self.reference_checks) {
            (Some(target), true) => self.check_references(key, target, &value),
            _ => None,
        };

        self.values.insert(key.to_string(), value);
        self.removed.remove(key);

        self.issues.clear(IssueKind::Invalid, key);
        if missing {
            self.issues.record_missing(key);
        } else {
            self.issues.clear(IssueKind::Missing, key);
        }
        match bad_reference {
            Some(entry) => self.issues.record_invalid_reference(entry),
            None => self.issues.clear(IssueKind::InvalidReference, key),
        }
        debug!(field = key, missing, "Field set");
    }

    /// Brings `value` to the expected type. `None` when it cannot be.
    fn conform(spec: &FieldSpec, value: Value) -> Option<Value> {
        if spec.expected.matches(&value) {
            return Some(value);
        }
        if value.is_null() && !spec.required {
            return Some(Value::Null);
        }
        if let Some(coerced) = coerce(&value, spec.expected) {
            return Some(coerced);
        }
        match &spec.empty {
            Some(empty) if value.is_null() => Some(empty.clone()),
            Some(empty) if &value == empty => Some(value),
            _ => None,
        }
    }

    fn check_references(&self, key: &str, target: &str, value: &Value) -> Option<InvalidReference> {
        let fault = |identifier: &Value| ReferenceFault {
            field: key.to_string(),
            target: target.to_string(),
            identifier: identifier.clone(),
        };
        let resolves = |identifier: &Value| {
            parse_identifier(identifier).map_or(false, |id| self.registry.exists(target, id))
        };

        match value {
            Value::Null => None,
            Value::Array(items) => {
                let faults: Vec<ReferenceFault> = items
                    .iter()
                    .filter(|item: &&Value| !item.is_null() && !resolves(*item))
                    .map(fault)
                    .collect();
                (!faults.is_empty()).then_some(InvalidReference::Group(faults))
            }
            scalar => (!resolves(scalar)).then(|| InvalidReference::Single(fault(scalar))),
        }
    }

    /// Clears `key`.
    ///
    /// A required field with a declared default falls back to that default.
    /// A required field without one is reported missing. Any other declared
    /// field is tracked as removed so it is persisted as null.
    pub fn delete(&mut self, key: &str) {
        self.issues.clear_each(
            key,
            &[IssueKind::Invalid, IssueKind::InvalidReference, IssueKind::Unknown],
        );

        let section = Arc::clone(&self.section);
        let Some(spec) = section.get(key) else {
            self.values.remove(key);
            return;
        };

        if spec.required {
            if let Some(empty) = &spec.empty {
                self.values.insert(key.to_string(), empty.clone());
                self.removed.remove(key);
                return;
            }
            self.issues.record_missing(key);
        }
        self.values.remove(key);
        self.removed.insert(key.to_string());
    }

    /// Drops `key` without removal tracking or issue accounting.
    pub fn discard(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Drops `key` from the unknown list.
    pub fn forget_unknown(&mut self, key: &str) -> bool {
        let known = self.issues.contains(IssueKind::Unknown, key);
        self.issues.clear(IssueKind::Unknown, key);
        known
    }

    /// Turns on reference validation for subsequent writes.
    pub fn enable_reference_checks(&mut self) {
        self.reference_checks = true;
    }

    /// Whether reference validation is active
    pub fn reference_checks_enabled(&self) -> bool {
        self.reference_checks
    }

    /// Current value of `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether `key` currently has a value
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All current values
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Accumulated issues
    pub fn issues(&self) -> &Issues {
        &self.issues
    }

    /// Fields cleared since the last save
    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.removed.iter().map(String::as_str)
    }

    /// Empties the removed set, returning its contents.
    pub fn take_removed(&mut self) -> Vec<String> {
        std::mem::take(&mut self.removed).into_iter().collect()
    }

    /// The bound schema section
    pub fn section(&self) -> &SchemaSection {
        &self.section
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("values", &self.values)
            .field("issues", &self.issues)
            .field("removed", &self.removed)
            .field("reference_checks", &self.reference_checks)
            .finish()
    }
}

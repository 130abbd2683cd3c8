//! Categorized validation issues
//!
//! Each category is a list kept free of stale entries: re-setting a field
//! removes it from every category it no longer belongs to. Entries are
//! unique per field within a category.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Issue categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Value could not be coerced to the expected type
    Invalid,
    /// Required value absent
    Missing,
    /// Referenced identifier does not resolve
    InvalidReference,
    /// Field is not declared in the schema
    Unknown,
}

impl IssueKind {
    /// Every category, in payload order
    pub const ALL: [IssueKind; 4] = [
        IssueKind::Invalid,
        IssueKind::Missing,
        IssueKind::InvalidReference,
        IssueKind::Unknown,
    ];

    /// Returns the payload key
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Invalid => "invalid",
            IssueKind::Missing => "missing",
            IssueKind::InvalidReference => "invalid_reference",
            IssueKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A field whose value failed type coercion.
///
/// Serialized as `[field, expected_label]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidField {
    pub field: String,
    pub expected: String,
}

impl Serialize for InvalidField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.field, &self.expected).serialize(serializer)
    }
}

/// One identifier that did not resolve.
///
/// Serialized as `[field, target, identifier]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFault {
    pub field: String,
    pub target: String,
    pub identifier: Value,
}

impl Serialize for ReferenceFault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.field, &self.target, &self.identifier).serialize(serializer)
    }
}

/// An `invalid_reference` entry.
///
/// A scalar reference field records its single fault directly, a list
/// field records all of its faults as one grouped entry. The two shapes are
/// distinct in the serialized payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InvalidReference {
    Single(ReferenceFault),
    Group(Vec<ReferenceFault>),
}

impl InvalidReference {
    /// Field the entry belongs to
    pub fn field(&self) -> Option<&str> {
        match self {
            InvalidReference::Single(fault) => Some(&fault.field),
            InvalidReference::Group(faults) => faults.first().map(|f| f.field.as_str()),
        }
    }

    /// Every fault in the entry
    pub fn faults(&self) -> &[ReferenceFault] {
        match self {
            InvalidReference::Single(fault) => std::slice::from_ref(fault),
            InvalidReference::Group(faults) => faults,
        }
    }
}

/// Structured issue map. Empty categories are omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Issues {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invalid: Vec<InvalidField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invalid_reference: Vec<InvalidReference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown: Vec<String>,
}

impl Issues {
    /// Whether no category has entries
    pub fn is_empty(&self) -> bool {
        IssueKind::ALL.iter().all(|kind| !self.has(*kind))
    }

    /// Whether `kind` has entries
    pub fn has(&self, kind: IssueKind) -> bool {
        match kind {
            IssueKind::Invalid => !self.invalid.is_empty(),
            IssueKind::Missing => !self.missing.is_empty(),
            IssueKind::InvalidReference => !self.invalid_reference.is_empty(),
            IssueKind::Unknown => !self.unknown.is_empty(),
        }
    }

    /// Fields listed under `kind`
    pub fn fields(&self, kind: IssueKind) -> Vec<&str> {
        match kind {
            IssueKind::Invalid => self.invalid.iter().map(|i| i.field.as_str()).collect(),
            IssueKind::Missing => self.missing.iter().map(String::as_str).collect(),
            IssueKind::InvalidReference => self
                .invalid_reference
                .iter()
                .filter_map(InvalidReference::field)
                .collect(),
            IssueKind::Unknown => self.unknown.iter().map(String::as_str).collect(),
        }
    }

    /// Whether `field` is listed under `kind`
    pub fn contains(&self, kind: IssueKind, field: &str) -> bool {
        self.fields(kind).contains(&field)
    }

    pub(crate) fn record_invalid(&mut self, field: &str, expected: &str) {
        self.clear(IssueKind::Invalid, field);
        self.invalid.push(InvalidField {
            field: field.to_string(),
            expected: expected.to_string(),
        });
    }

    pub(crate) fn record_missing(&mut self, field: &str) {
        if !self.missing.iter().any(|f| f == field) {
            self.missing.push(field.to_string());
        }
    }

    pub(crate) fn record_invalid_reference(&mut self, entry: InvalidReference) {
        if let Some(field) = entry.field() {
            let field = field.to_string();
            self.clear(IssueKind::InvalidReference, &field);
        }
        self.invalid_reference.push(entry);
    }

    pub(crate) fn record_unknown(&mut self, field: &str) {
        if !self.unknown.iter().any(|f| f == field) {
            self.unknown.push(field.to_string());
        }
    }

    /// Removes `field` from the `kind` list, if present.
    pub(crate) fn clear(&mut self, kind: IssueKind, field: &str) {
        match kind {
            IssueKind::Invalid => self.invalid.retain(|i| i.field != field),
            IssueKind::Missing => self.missing.retain(|f| f != field),
            IssueKind::InvalidReference => {
                self.invalid_reference.retain(|r| r.field() != Some(field))
            }
            IssueKind::Unknown => self.unknown.retain(|f| f != field),
        }
    }

    pub(crate) fn clear_each(&mut self, field: &str, kinds: &[IssueKind]) {
        for kind in kinds {
            self.clear(*kind, field);
        }
    }

    /// Appends every category of `other` not listed in `ignore`.
    pub fn merge(&mut self, other: &Issues, ignore: &[IssueKind]) {
        if !ignore.contains(&IssueKind::Invalid) {
            self.invalid.extend(other.invalid.iter().cloned());
        }
        if !ignore.contains(&IssueKind::Missing) {
            self.missing.extend(other.missing.iter().cloned());
        }
        if !ignore.contains(&IssueKind::InvalidReference) {
            self.invalid_reference
                .extend(other.invalid_reference.iter().cloned());
        }
        if !ignore.contains(&IssueKind::Unknown) {
            self.unknown.extend(other.unknown.iter().cloned());
        }
    }
}

impl fmt::Display for Issues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for kind in IssueKind::ALL {
            let fields = self.fields(kind);
            if fields.is_empty() {
                continue;
            }
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", kind, fields.join(", "))?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fault(field: &str, id: i64) -> ReferenceFault {
        ReferenceFault {
            field: field.into(),
            target: "walker".into(),
            identifier: json!(id),
        }
    }

    #[test]
    fn test_entries_unique_per_field() {
        let mut issues = Issues::default();
        issues.record_missing("name");
        issues.record_missing("name");
        issues.record_invalid("rank", "Integer (1,2,3)");
        issues.record_invalid("rank", "Integer (1,2,3)");
        assert_eq!(issues.missing.len(), 1);
        assert_eq!(issues.invalid.len(), 1);
    }

    #[test]
    fn test_clear_is_tolerant_of_absence() {
        let mut issues = Issues::default();
        issues.clear(IssueKind::Missing, "nothing");
        issues.record_unknown("extra");
        issues.clear_each("extra", &IssueKind::ALL);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let mut issues = Issues::default();
        issues.record_invalid("rank", "Integer (1,2,3)");
        issues.record_invalid_reference(InvalidReference::Single(fault("walker", 9)));
        issues.record_invalid_reference(InvalidReference::Group(vec![
            fault("walkers", 7),
            fault("walkers", 8),
        ]));

        let value = serde_json::to_value(&issues).unwrap();
        assert_eq!(
            value,
            json!({
                "invalid": [["rank", "Integer (1,2,3)"]],
                "invalid_reference": [
                    ["walker", "walker", 9],
                    [["walkers", "walker", 7], ["walkers", "walker", 8]]
                ]
            })
        );
    }

    #[test]
    fn test_merge_respects_ignore() {
        let mut left = Issues::default();
        let mut right = Issues::default();
        right.record_missing("name");
        right.record_unknown("bogus");
        left.merge(&right, &[IssueKind::Unknown]);
        assert_eq!(left.missing, vec!["name".to_string()]);
        assert!(left.unknown.is_empty());
    }

    #[test]
    fn test_display() {
        let mut issues = Issues::default();
        issues.record_missing("name");
        issues.record_missing("rank");
        issues.record_unknown("x");
        assert_eq!(issues.to_string(), "missing: name, rank; unknown: x");
    }
}

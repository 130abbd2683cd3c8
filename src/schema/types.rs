//! Schema type definitions
//!
//! Supported expected types:
//! - string: UTF-8 string
//! - int: 64-bit signed integer
//! - float: 64-bit floating point
//! - bool: Boolean
//! - list: JSON array (never coerced from a scalar)

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::resource::DependencyHook;

/// Expected semantic type of a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 string
    #[default]
    #[serde(alias = "str")]
    String,
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// Boolean
    Bool,
    /// Array of values
    List,
}

impl FieldType {
    /// Returns the type name used in logs
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::List => "list",
        }
    }

    /// Returns the label reported back to users in `invalid` issues
    pub fn label(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Int => "Integer (1,2,3)",
            FieldType::Float => "Decimal (1.0, 1.5)",
            FieldType::Bool => "True|False",
            FieldType::List => "Comma-delimited list",
        }
    }

    /// Whether the runtime representation of `value` already is this type.
    ///
    /// Null never matches.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_f64(),
            FieldType::Bool => value.is_boolean(),
            FieldType::List => value.is_array(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Settings block for a single field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Expected semantic type
    #[serde(default)]
    pub expected: FieldType,
    /// Whether a value must be present before saving
    #[serde(default, alias = "require")]
    pub required: bool,
    /// Declared "empty" default. `Some(Value::Null)` is a declared null,
    /// which is not the same as no default at all.
    #[serde(
        default,
        deserialize_with = "deserialize_declared",
        skip_serializing_if = "Option::is_none"
    )]
    pub empty: Option<Value>,
    /// Resource type this field holds identifier(s) of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    /// Whether the reference is exposed to clients as a URI
    #[serde(default)]
    pub uri: bool,
    /// Human readable description
    #[serde(default)]
    pub description: String,
    /// Allowed values, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

/// Keeps an explicit `"empty": null` distinguishable from an absent key.
fn deserialize_declared<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl FieldSpec {
    /// Create a required field of the given type
    pub fn required(expected: FieldType) -> Self {
        Self {
            expected,
            required: true,
            ..Default::default()
        }
    }

    /// Create an optional field of the given type
    pub fn optional(expected: FieldType) -> Self {
        Self {
            expected,
            required: false,
            ..Default::default()
        }
    }

    /// Declare the empty default
    pub fn with_empty(mut self, empty: Value) -> Self {
        self.empty = Some(empty);
        self
    }

    /// Declare the field as a reference to another resource type
    pub fn references(mut self, resource_type: impl Into<String>) -> Self {
        self.references = Some(resource_type.into());
        self
    }

    /// Expose the reference as a URI
    pub fn as_uri(mut self) -> Self {
        self.uri = true;
        self
    }

    /// Set the description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether the field declares an empty default
    pub fn has_empty(&self) -> bool {
        self.empty.is_some()
    }
}

/// Field information exposed to API consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub descr: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

/// One section (`fields` or `settings`) of a resource schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaSection {
    entries: BTreeMap<String, FieldSpec>,
}

impl SchemaSection {
    /// Create an empty section
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, builder style
    pub fn with(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.entries.insert(name.into(), spec);
        self
    }

    /// Look up a field
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.entries.get(name)
    }

    /// Whether the section declares `name`
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.entries.iter()
    }

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no fields are declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Field listing for resource information responses
    pub fn describe(&self) -> Vec<FieldInfo> {
        self.entries
            .iter()
            .map(|(name, spec)| FieldInfo {
                name: name.clone(),
                descr: spec.description.clone(),
                required: spec.required,
                values: spec.values.clone(),
            })
            .collect()
    }
}

impl FromIterator<(String, FieldSpec)> for SchemaSection {
    fn from_iter<I: IntoIterator<Item = (String, FieldSpec)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A resource type whose rows reference another resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependent {
    /// Referring resource type
    pub resource_type: String,
    /// Table the referring rows live in
    pub table: String,
    /// Primary key column of that table
    pub primary_key: String,
    /// Storage column holding the reference
    pub column: String,
}

fn default_include_scope() -> bool {
    true
}

/// Complete, static description of one resource type
#[derive(Clone, Serialize, Deserialize)]
pub struct ResourceDef {
    /// Resource type name
    pub name: String,
    /// Storage table
    pub table: String,
    /// Primary key column
    pub primary_key: String,
    /// Whether the scope id is written on save
    #[serde(default = "default_include_scope")]
    pub include_scope: bool,
    /// Public field name -> storage column name
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    /// Field used as display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_field: Option<String>,
    /// Column ordering search results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_field: Option<String>,
    /// Data fields
    pub fields: Arc<SchemaSection>,
    /// Settings fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Arc<SchemaSection>>,
    /// Filled in by the catalog when linking
    #[serde(skip)]
    pub dependents: Vec<Dependent>,
    #[serde(skip)]
    dependency_hook: Option<Arc<dyn DependencyHook>>,
}

impl ResourceDef {
    /// Create a definition with a fields section and defaults for the rest
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
        fields: SchemaSection,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: primary_key.into(),
            include_scope: true,
            translations: BTreeMap::new(),
            name_field: None,
            search_field: None,
            fields: Arc::new(fields),
            settings: None,
            dependents: Vec::new(),
            dependency_hook: None,
        }
    }

    /// Attach a settings section
    pub fn with_settings(mut self, settings: SchemaSection) -> Self {
        self.settings = Some(Arc::new(settings));
        self
    }

    /// Add a public -> storage rename
    pub fn with_translation(mut self, public: impl Into<String>, column: impl Into<String>) -> Self {
        self.translations.insert(public.into(), column.into());
        self
    }

    /// Set the display name field
    pub fn with_name_field(mut self, field: impl Into<String>) -> Self {
        self.name_field = Some(field.into());
        self
    }

    /// Set the search ordering column
    pub fn with_search_field(mut self, field: impl Into<String>) -> Self {
        self.search_field = Some(field.into());
        self
    }

    /// Toggle scope inclusion on save
    pub fn with_scope(mut self, include_scope: bool) -> Self {
        self.include_scope = include_scope;
        self
    }

    /// Replace the dependent scan with a custom hook
    pub fn with_dependency_hook(mut self, hook: Arc<dyn DependencyHook>) -> Self {
        self.dependency_hook = Some(hook);
        self
    }

    /// Custom dependency hook, if any
    pub fn dependency_hook(&self) -> Option<&Arc<dyn DependencyHook>> {
        self.dependency_hook.as_ref()
    }

    /// Whether `key` is declared in the settings section
    pub fn is_setting(&self, key: &str) -> bool {
        self.settings.as_ref().map_or(false, |s| s.contains(key))
    }

    /// Storage column for a public field name
    pub fn column_for(&self, field: &str) -> String {
        self.translations
            .get(field)
            .cloned()
            .unwrap_or_else(|| field.to_string())
    }

    /// Checks the definition on its own (not against other definitions)
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("resource name must not be empty".into());
        }
        if self.table.is_empty() || self.primary_key.is_empty() {
            return Err(format!("'{}' must declare table and primary_key", self.name));
        }
        let sections = std::iter::once(self.fields.as_ref()).chain(self.settings.as_deref());
        for section in sections {
            for (field, spec) in section.iter() {
                if spec.uri && spec.references.is_none() {
                    return Err(format!(
                        "field '{}' is exposed as uri but references no resource",
                        field
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ResourceDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDef")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("include_scope", &self.include_scope)
            .field("fields", &self.fields.len())
            .field("settings", &self.settings.as_ref().map(|s| s.len()))
            .field("dependents", &self.dependents)
            .field("dependency_hook", &self.dependency_hook.is_some())
            .finish()
    }
}

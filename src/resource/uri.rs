//! Identifier <-> URI representation of reference fields
//!
//! Reference fields declared with `uri: true` are exchanged with clients as
//! `<api_base>/<resource_type>/<identifier>` links. Inbound links that do not
//! match the expected collection are discarded, never reported.

use serde_json::{Map, Value};

use super::resource::{Resource, SETTINGS_KEY};
use crate::schema::{FieldSpec, ResourceDef, SchemaSection};
use crate::tracker::parse_identifier;

/// Renders and parses resource links below an API base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriResolver {
    api_base: String,
}

impl Default for UriResolver {
    fn default() -> Self {
        Self::new("/api")
    }
}

impl UriResolver {
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Collection path of `resource_type`
    pub fn base(&self, resource_type: &str) -> String {
        format!("{}/{}", self.api_base, resource_type)
    }

    /// Link to one resource
    pub fn link_for(&self, resource_type: &str, identifier: i64) -> String {
        format!("{}/{}", self.base(resource_type), identifier)
    }

    /// Identifier embedded in `link`, if it points into `resource_type`.
    pub fn parse_link(&self, resource_type: &str, link: &str) -> Option<i64> {
        let id = link.strip_prefix(&format!("{}/", self.base(resource_type)))?;
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        id.parse().ok()
    }

    /// Converts client links in `data` to identifiers.
    pub fn inbound(&self, def: &ResourceDef, data: &Map<String, Value>) -> Map<String, Value> {
        self.inbound_section(def, &def.fields, data)
    }

    fn inbound_section(
        &self,
        def: &ResourceDef,
        section: &SchemaSection,
        data: &Map<String, Value>,
    ) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, value) in data {
            if let (Value::Object(nested), Some(settings)) = (value, def.settings.as_deref()) {
                if key == SETTINGS_KEY {
                    let nested = self.inbound_section(def, settings, nested);
                    out.insert(key.clone(), Value::Object(nested));
                    continue;
                }
            }
            let target = section.get(key).and_then(uri_target);
            let Some(target) = target else {
                out.insert(key.clone(), value.clone());
                continue;
            };
            match value {
                Value::Null => {
                    out.insert(key.clone(), Value::Null);
                }
                Value::Array(items) => {
                    let ids = items
                        .iter()
                        .filter_map(|item| self.parse_value(target, item))
                        .map(Value::from)
                        .collect();
                    out.insert(key.clone(), Value::Array(ids));
                }
                scalar => {
                    if let Some(id) = self.parse_value(target, scalar) {
                        out.insert(key.clone(), Value::from(id));
                    }
                }
            }
        }
        out
    }

    fn parse_value(&self, resource_type: &str, value: &Value) -> Option<i64> {
        value.as_str().and_then(|link| self.parse_link(resource_type, link))
    }

    /// Public representation of `resource` with links for URI fields.
    pub fn render(&self, resource: &Resource) -> Map<String, Value> {
        match resource.to_value() {
            Value::Object(values) => self.outbound(resource.definition(), &values),
            _ => Map::new(),
        }
    }

    /// Converts identifiers in `values` to client links.
    ///
    /// Declared fields holding null are replaced by their declared non-null
    /// empty value, or left out.
    pub fn outbound(&self, def: &ResourceDef, values: &Map<String, Value>) -> Map<String, Value> {
        self.outbound_section(def, &def.fields, values)
    }

    fn outbound_section(
        &self,
        def: &ResourceDef,
        section: &SchemaSection,
        values: &Map<String, Value>,
    ) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, value) in values {
            if let (Value::Object(nested), Some(settings)) = (value, def.settings.as_deref()) {
                if key == SETTINGS_KEY {
                    let nested = self.outbound_section(def, settings, nested);
                    out.insert(key.clone(), Value::Object(nested));
                    continue;
                }
            }
            let Some(spec) = section.get(key) else {
                out.insert(key.clone(), value.clone());
                continue;
            };
            if value.is_null() {
                match &spec.empty {
                    Some(empty) if !empty.is_null() => {
                        out.insert(key.clone(), empty.clone());
                    }
                    _ => {}
                }
                continue;
            }
            let rendered = match uri_target(spec) {
                Some(target) => self.render_value(target, value),
                None => value.clone(),
            };
            out.insert(key.clone(), rendered);
        }
        out
    }

    fn render_value(&self, resource_type: &str, value: &Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .filter_map(parse_identifier)
                    .map(|id| Value::String(self.link_for(resource_type, id)))
                    .collect(),
            ),
            scalar => match parse_identifier(scalar) {
                Some(id) => Value::String(self.link_for(resource_type, id)),
                None => scalar.clone(),
            },
        }
    }
}

fn uri_target(spec: &FieldSpec) -> Option<&str> {
    if spec.uri {
        spec.references.as_deref()
    } else {
        None
    }
}

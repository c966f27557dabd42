//! Datatype plugins: per-node validation and tile-value transformation.
//!
//! Every staged field runs through the plugin named by its node's datatype.
//! `transform_value_for_tile` turns source data (a label string, a resource
//! id, a reference label) into the stored tile shape; `validate` checks the
//! transformed value. Neither returns an `Err` for bad data: problems come
//! back as [`ValidationError`]s and are recorded against the load.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::graph_model::NodeDef;
use crate::lookups::ControlledLists;
use crate::models::{TileNodeValue, ValidationError};

/// Contract implemented by every datatype plugin.
pub trait Datatype: Send + Sync {
    /// Datatype name as stored on nodes.
    fn name(&self) -> &'static str;

    /// Convert source data to the stored tile value.
    fn transform_value_for_tile(
        &self,
        value: &JsonValue,
        config: &JsonValue,
        lists: &ControlledLists,
    ) -> std::result::Result<JsonValue, ValidationError>;

    /// Validate an already transformed value.
    fn validate(&self, value: &JsonValue, config: &JsonValue) -> Vec<ValidationError>;
}

/// Registry of datatype plugins keyed by datatype name.
pub struct DatatypeRegistry {
    plugins: HashMap<&'static str, Box<dyn Datatype>>,
}

impl std::fmt::Debug for DatatypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.plugins.keys().collect();
        names.sort();
        f.debug_struct("DatatypeRegistry")
            .field("plugins", &names)
            .finish()
    }
}

impl Default for DatatypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl DatatypeRegistry {
    pub fn empty() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    /// Registry with every datatype used by the built-in graph models.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(NonLocalizedString));
        registry.register(Box::new(ResourceInstance { multiple: false }));
        registry.register(Box::new(ResourceInstance { multiple: true }));
        registry.register(Box::new(Reference));
        registry.register(Box::new(Url));
        registry.register(Box::new(Date));
        registry
    }

    pub fn register(&mut self, plugin: Box<dyn Datatype>) {
        self.plugins.insert(plugin.name(), plugin);
    }

    /// Look up a plugin. A node whose datatype has no plugin is a model
    /// configuration problem, not a data problem.
    pub fn get(&self, name: &str) -> Result<&dyn Datatype> {
        self.plugins
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| Error::Config(format!("No datatype plugin registered for '{}'", name)))
    }

    /// Transform and validate one source value for `node`.
    ///
    /// Returns the staged value (with `valid` set) and any validation errors.
    pub fn prepare(
        &self,
        node: &NodeDef,
        source: &JsonValue,
        lists: &ControlledLists,
    ) -> Result<(TileNodeValue, Vec<ValidationError>)> {
        let plugin = self.get(&node.datatype)?;
        let (value, errors) = match plugin.transform_value_for_tile(source, &node.config, lists) {
            Ok(transformed) => {
                let errors = plugin.validate(&transformed, &node.config);
                (transformed, errors)
            }
            Err(err) => (JsonValue::Null, vec![err]),
        };
        let notes = errors
            .iter()
            .map(|e| format!("{}|{}", e.title, e.message))
            .collect::<Vec<_>>()
            .join("|");
        Ok((
            TileNodeValue {
                value,
                valid: errors.is_empty(),
                source: source.clone(),
                notes,
                datatype: node.datatype.clone(),
            },
            errors,
        ))
    }
}

// =============================================================================
// BUILT-IN PLUGINS
// =============================================================================

/// Plain string without per-language variants.
pub struct NonLocalizedString;

impl Datatype for NonLocalizedString {
    fn name(&self) -> &'static str {
        "non-localized-string"
    }

    fn transform_value_for_tile(
        &self,
        value: &JsonValue,
        _config: &JsonValue,
        _lists: &ControlledLists,
    ) -> std::result::Result<JsonValue, ValidationError> {
        match value {
            JsonValue::Null | JsonValue::String(_) => Ok(value.clone()),
            JsonValue::Number(n) => Ok(JsonValue::String(n.to_string())),
            JsonValue::Bool(b) => Ok(JsonValue::String(b.to_string())),
            other => Err(ValidationError::new(
                "Invalid string",
                format!("Expected a string, got {}", other),
            )),
        }
    }

    fn validate(&self, value: &JsonValue, _config: &JsonValue) -> Vec<ValidationError> {
        match value {
            JsonValue::Null | JsonValue::String(_) => vec![],
            other => vec![ValidationError::new(
                "Invalid string",
                format!("Expected a string, got {}", other),
            )],
        }
    }
}

/// Reference(s) to other resource instances.
pub struct ResourceInstance {
    multiple: bool,
}

impl ResourceInstance {
    fn reference(resource_id: &str) -> JsonValue {
        json!({
            "resourceId": resource_id,
            "ontologyProperty": "",
            "resourceXresourceId": "",
            "inverseOntologyProperty": "",
        })
    }
}

impl Datatype for ResourceInstance {
    fn name(&self) -> &'static str {
        if self.multiple {
            "resource-instance-list"
        } else {
            "resource-instance"
        }
    }

    fn transform_value_for_tile(
        &self,
        value: &JsonValue,
        _config: &JsonValue,
        _lists: &ControlledLists,
    ) -> std::result::Result<JsonValue, ValidationError> {
        match value {
            JsonValue::Null => Ok(JsonValue::Null),
            JsonValue::String(id) => Ok(json!([Self::reference(id)])),
            JsonValue::Object(_) => Ok(json!([value.clone()])),
            JsonValue::Array(_) => Ok(value.clone()),
            other => Err(ValidationError::new(
                "Invalid resource reference",
                format!("Cannot convert {} to a resource reference", other),
            )),
        }
    }

    fn validate(&self, value: &JsonValue, _config: &JsonValue) -> Vec<ValidationError> {
        let items = match value {
            JsonValue::Null => return vec![],
            JsonValue::Array(items) => items,
            other => {
                return vec![ValidationError::new(
                    "Invalid resource reference",
                    format!("Expected a list of references, got {}", other),
                )]
            }
        };
        let mut errors = Vec::new();
        if !self.multiple && items.len() > 1 {
            errors.push(ValidationError::new(
                "Too many references",
                format!("Expected at most one resource reference, got {}", items.len()),
            ));
        }
        for item in items {
            let id = item.get("resourceId").and_then(|v| v.as_str());
            if id.and_then(|s| Uuid::parse_str(s).ok()).is_none() {
                errors.push(ValidationError::new(
                    "Invalid resource reference",
                    format!("'{}' does not contain a valid resourceId", item),
                ));
            }
        }
        errors
    }
}

/// Reference to an item in a controlled list.
pub struct Reference;

impl Datatype for Reference {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn transform_value_for_tile(
        &self,
        value: &JsonValue,
        config: &JsonValue,
        lists: &ControlledLists,
    ) -> std::result::Result<JsonValue, ValidationError> {
        match value {
            JsonValue::Null => Ok(JsonValue::Null),
            JsonValue::Array(_) => Ok(value.clone()),
            JsonValue::String(label) => {
                let list_id = config
                    .get("controlledList")
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| {
                        ValidationError::new(
                            "Missing controlled list",
                            "Reference node has no controlledList configured",
                        )
                    })?;
                lists
                    .find(list_id, label)
                    .map(|item| item.to_reference())
                    .ok_or_else(|| {
                        ValidationError::new(
                            "Invalid reference",
                            format!("'{}' is not an item of list {}", label, list_id),
                        )
                    })
            }
            other => Err(ValidationError::new(
                "Invalid reference",
                format!("Cannot convert {} to a list item reference", other),
            )),
        }
    }

    fn validate(&self, value: &JsonValue, _config: &JsonValue) -> Vec<ValidationError> {
        match value {
            JsonValue::Null => vec![],
            JsonValue::Array(items)
                if items
                    .iter()
                    .all(|i| i.get("uri").is_some() && i.get("labels").is_some()) =>
            {
                vec![]
            }
            other => vec![ValidationError::new(
                "Invalid reference",
                format!("'{}' is not a list item reference", other),
            )],
        }
    }
}

/// URL with optional label.
pub struct Url;

impl Datatype for Url {
    fn name(&self) -> &'static str {
        "url"
    }

    fn transform_value_for_tile(
        &self,
        value: &JsonValue,
        _config: &JsonValue,
        _lists: &ControlledLists,
    ) -> std::result::Result<JsonValue, ValidationError> {
        match value {
            JsonValue::Null | JsonValue::Object(_) => Ok(value.clone()),
            JsonValue::String(url) => Ok(json!({"url": url, "url_label": JsonValue::Null})),
            other => Err(ValidationError::new(
                "Invalid URL",
                format!("Cannot convert {} to a URL", other),
            )),
        }
    }

    fn validate(&self, value: &JsonValue, _config: &JsonValue) -> Vec<ValidationError> {
        if value.is_null() {
            return vec![];
        }
        match value.get("url").and_then(|v| v.as_str()) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => vec![],
            _ => vec![ValidationError::new(
                "Invalid URL",
                format!("'{}' is not an http(s) URL", value),
            )],
        }
    }
}

/// Calendar date (`YYYY-MM-DD`).
pub struct Date;

impl Datatype for Date {
    fn name(&self) -> &'static str {
        "date"
    }

    fn transform_value_for_tile(
        &self,
        value: &JsonValue,
        _config: &JsonValue,
        _lists: &ControlledLists,
    ) -> std::result::Result<JsonValue, ValidationError> {
        Ok(value.clone())
    }

    fn validate(&self, value: &JsonValue, _config: &JsonValue) -> Vec<ValidationError> {
        match value {
            JsonValue::Null => vec![],
            JsonValue::String(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => vec![],
            other => vec![ValidationError::new(
                "Invalid date",
                format!("'{}' is not a YYYY-MM-DD date", other),
            )],
        }
    }
}

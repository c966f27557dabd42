//! Per-run lookup context: languages, controlled lists and graph models.
//!
//! A [`MigrationContext`] is built once per load and passed explicitly to the
//! mapper, the datatype registry and the staging engine. Nothing here is a
//! process-wide cache.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::debug;
use uuid::Uuid;

use crate::config::LingoConfig;
use crate::graph_model::GraphModel;
use crate::models::{ResourceKind, UnmappedPolicy};

/// Controlled list ids used by the reference nodes of the built-in models.
pub mod lists {
    use uuid::{uuid, Uuid};

    pub const LANGUAGES: Uuid = uuid!("55ce793e-030a-4a7b-8e0c-5e7b1c5b8a01");
    pub const LABEL_TYPES: Uuid = uuid!("55ce793e-030a-4a7b-8e0c-5e7b1c5b8a02");
    pub const STATEMENT_TYPES: Uuid = uuid!("55ce793e-030a-4a7b-8e0c-5e7b1c5b8a03");
    pub const IDENTIFIER_TYPES: Uuid = uuid!("55ce793e-030a-4a7b-8e0c-5e7b1c5b8a04");
    pub const RELATION_TYPES: Uuid = uuid!("55ce793e-030a-4a7b-8e0c-5e7b1c5b8a05");
}

// =============================================================================
// LANGUAGES
// =============================================================================

/// Bidirectional language code ↔ name lookup.
#[derive(Debug, Clone, Default)]
pub struct LanguageLookup {
    name_by_code: BTreeMap<String, String>,
    code_by_name: HashMap<String, String>,
}

impl LanguageLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Languages known to a fresh installation.
    pub fn with_defaults() -> Self {
        let mut lookup = Self::new();
        for (code, name) in [
            ("en", "English"),
            ("de", "German"),
            ("fr", "French"),
            ("es", "Spanish"),
            ("it", "Italian"),
            ("nl", "Dutch"),
            ("pt", "Portuguese"),
            ("zh", "Chinese"),
            ("ja", "Japanese"),
            ("ar", "Arabic"),
        ] {
            lookup.insert(code, name);
        }
        lookup
    }

    pub fn insert(&mut self, code: impl Into<String>, name: impl Into<String>) {
        let code = code.into();
        let name = name.into();
        self.code_by_name.insert(name.clone(), code.clone());
        self.name_by_code.insert(code, name);
    }

    pub fn name_for(&self, code: &str) -> Option<&str> {
        self.name_by_code.get(code).map(String::as_str)
    }

    /// Resolve either a language name or a code to its code.
    pub fn code_for(&self, name_or_code: &str) -> Option<&str> {
        if let Some(code) = self.code_by_name.get(name_or_code) {
            return Some(code.as_str());
        }
        self.name_by_code
            .get_key_value(name_or_code)
            .map(|(code, _)| code.as_str())
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.name_by_code.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.name_by_code
            .iter()
            .map(|(c, n)| (c.as_str(), n.as_str()))
    }
}

// =============================================================================
// CONTROLLED LISTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItemLabel {
    pub value: String,
    pub language: String,
    pub valuetype: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub id: Uuid,
    pub list_id: Uuid,
    pub uri: String,
    pub labels: Vec<ListItemLabel>,
}

impl ListItem {
    /// Build an item with a single English preferred label and a
    /// deterministic id derived from the list id and label.
    pub fn with_label(list_id: Uuid, label: &str) -> Self {
        let id = Uuid::new_v5(&list_id, label.as_bytes());
        Self {
            id,
            list_id,
            uri: format!("http://localhost:8000/plugins/controlled-list-manager/item/{}", id),
            labels: vec![ListItemLabel {
                value: label.to_string(),
                language: "en".to_string(),
                valuetype: "prefLabel".to_string(),
            }],
        }
    }

    pub fn matches(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.value == label)
    }

    pub fn preferred_label(&self) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.valuetype == "prefLabel")
            .or_else(|| self.labels.first())
            .map(|l| l.value.as_str())
    }

    /// Reference-datatype tile value pointing at this item.
    pub fn to_reference(&self) -> JsonValue {
        let labels: Vec<JsonValue> = self
            .labels
            .iter()
            .map(|l| {
                json!({
                    "value": l.value,
                    "language_id": l.language,
                    "valuetype_id": l.valuetype,
                    "list_item_id": self.id,
                })
            })
            .collect();
        json!([{ "uri": self.uri, "list_id": self.list_id, "labels": labels }])
    }
}

/// Controlled lists known to a run.
#[derive(Debug, Clone, Default)]
pub struct ControlledLists {
    items: BTreeMap<Uuid, Vec<ListItem>>,
    added: Vec<ListItem>,
}

impl ControlledLists {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists shipped with the built-in models, languages taken from `languages`.
    pub fn with_defaults(languages: &LanguageLookup) -> Self {
        let mut registry = Self::new();
        for (_, name) in languages.iter() {
            registry.insert(ListItem::with_label(lists::LANGUAGES, name));
        }
        for label in ["prefLabel", "altLabel", "hiddenLabel"] {
            registry.insert(ListItem::with_label(lists::LABEL_TYPES, label));
        }
        for label in [
            "note",
            "changeNote",
            "definition",
            "description",
            "editorialNote",
            "example",
            "historyNote",
            "scopeNote",
            "broadMatch",
            "closeMatch",
            "exactMatch",
            "narrowMatch",
            "relatedMatch",
            "mappingRelation",
            "inverseOf",
        ] {
            registry.insert(ListItem::with_label(lists::STATEMENT_TYPES, label));
        }
        registry.insert(ListItem::with_label(lists::IDENTIFIER_TYPES, "identifier"));
        for label in ["broader", "narrower", "related"] {
            registry.insert(ListItem::with_label(lists::RELATION_TYPES, label));
        }
        registry
    }

    pub fn insert(&mut self, item: ListItem) {
        self.items.entry(item.list_id).or_default().push(item);
    }

    pub fn find(&self, list_id: Uuid, label: &str) -> Option<&ListItem> {
        self.items
            .get(&list_id)
            .and_then(|items| items.iter().find(|i| i.matches(label)))
    }

    /// Add an item discovered during the run; tracked so it can be persisted.
    pub fn add_discovered(&mut self, item: ListItem) {
        self.added.push(item.clone());
        self.insert(item);
    }

    /// Items added during this run via [`ControlledLists::add_discovered`].
    pub fn discovered(&self) -> &[ListItem] {
        &self.added
    }

    pub fn items(&self) -> impl Iterator<Item = &ListItem> {
        self.items.values().flatten()
    }
}

/// Preferred label of a reference-datatype value.
///
/// Accepts the stored reference array, a single reference object, or a bare
/// string (returned as-is).
pub fn reference_label(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Array(items) => items.first().and_then(reference_label),
        JsonValue::Object(obj) => {
            let labels = obj.get("labels")?.as_array()?;
            labels
                .iter()
                .find(|l| l.get("valuetype_id").and_then(|v| v.as_str()) == Some("prefLabel"))
                .or_else(|| labels.first())
                .and_then(|l| l.get("value"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        }
        _ => None,
    }
}

// =============================================================================
// MIGRATION CONTEXT
// =============================================================================

/// Everything a single load needs to resolve names, nodes and lists.
#[derive(Debug, Clone)]
pub struct MigrationContext {
    pub schemes: GraphModel,
    pub concepts: GraphModel,
    pub languages: LanguageLookup,
    pub lists: ControlledLists,
    pub unmapped_policy: UnmappedPolicy,
    pub default_language: String,
    discovered_languages: Vec<(String, String)>,
}

impl MigrationContext {
    pub fn new(
        schemes: GraphModel,
        concepts: GraphModel,
        languages: LanguageLookup,
        lists: ControlledLists,
        config: &LingoConfig,
    ) -> Self {
        Self {
            schemes,
            concepts,
            languages,
            lists,
            unmapped_policy: config.unmapped_policy,
            default_language: config.default_language.clone(),
            discovered_languages: Vec::new(),
        }
    }

    /// Context over the built-in models, languages and lists.
    pub fn builtin(config: &LingoConfig) -> Self {
        let languages = LanguageLookup::with_defaults();
        let lists = ControlledLists::with_defaults(&languages);
        Self::new(
            GraphModel::lingo_schemes(),
            GraphModel::lingo_concepts(),
            languages,
            lists,
            config,
        )
    }

    pub fn graph(&self, kind: ResourceKind) -> &GraphModel {
        match kind {
            ResourceKind::Scheme => &self.schemes,
            ResourceKind::Concept => &self.concepts,
        }
    }

    /// Make sure a language code is known, registering it (name = code) and
    /// adding it to the Languages list when it is not.
    pub fn ensure_language(&mut self, code: &str) {
        if self.languages.contains_code(code) {
            return;
        }
        debug!(
            subsystem = "core",
            component = "lookups",
            language = code,
            "Registering language discovered during import"
        );
        self.languages.insert(code, code);
        self.lists
            .add_discovered(ListItem::with_label(lists::LANGUAGES, code));
        self.discovered_languages
            .push((code.to_string(), code.to_string()));
    }

    /// Languages registered by [`MigrationContext::ensure_language`] as (code, name).
    pub fn discovered_languages(&self) -> &[(String, String)] {
        &self.discovered_languages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_lookup_both_directions() {
        let langs = LanguageLookup::with_defaults();
        assert_eq!(langs.name_for("de"), Some("German"));
        assert_eq!(langs.code_for("German"), Some("de"));
        assert_eq!(langs.code_for("de"), Some("de"));
        assert_eq!(langs.code_for("Klingon"), None);
    }

    #[test]
    fn test_list_item_reference_label_roundtrip() {
        let item = ListItem::with_label(lists::LABEL_TYPES, "altLabel");
        let reference = item.to_reference();
        assert_eq!(reference_label(&reference).as_deref(), Some("altLabel"));
        assert_eq!(reference[0]["list_id"], json!(lists::LABEL_TYPES));
    }

    #[test]
    fn test_reference_label_accepts_plain_string() {
        assert_eq!(
            reference_label(&json!("scopeNote")).as_deref(),
            Some("scopeNote")
        );
        assert_eq!(reference_label(&json!(null)), None);
        assert_eq!(reference_label(&json!([])), None);
    }

    #[test]
    fn test_default_lists_contain_label_types() {
        let registry = ControlledLists::with_defaults(&LanguageLookup::with_defaults());
        assert!(registry.find(lists::LABEL_TYPES, "prefLabel").is_some());
        assert!(registry.find(lists::LANGUAGES, "English").is_some());
        assert!(registry.find(lists::LANGUAGES, "en").is_none());
        assert!(registry.find(lists::STATEMENT_TYPES, "exactMatch").is_some());
    }

    #[test]
    fn test_list_item_ids_are_deterministic() {
        let a = ListItem::with_label(lists::LANGUAGES, "English");
        let b = ListItem::with_label(lists::LANGUAGES, "English");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, ListItem::with_label(lists::LANGUAGES, "German").id);
    }

    #[test]
    fn test_ensure_language_registers_once() {
        let mut ctx = MigrationContext::builtin(&LingoConfig::default());
        ctx.ensure_language("en");
        assert!(ctx.discovered_languages().is_empty());

        ctx.ensure_language("cy");
        ctx.ensure_language("cy");
        assert_eq!(ctx.discovered_languages().len(), 1);
        assert_eq!(ctx.languages.name_for("cy"), Some("cy"));
        assert!(ctx.lists.find(lists::LANGUAGES, "cy").is_some());
        assert_eq!(ctx.lists.discovered().len(), 1);
    }
}

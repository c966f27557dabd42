//! Value and relationship records → mock tiles.
//!
//! Pure conversions shared by the legacy RDM migration and the SKOS reader.
//! Labels go to `appellative_status`, identifiers to `identifier`, notes to
//! `statement`; relationships become a single resource reference on the
//! nodegroup they belong to.

use serde_json::{json, Value as JsonValue};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lookups::LanguageLookup;
use crate::models::{MockTile, NodegroupKind, ResourceKind, SourceValue, UnmappedPolicy};

/// Valuetypes stored as labels.
pub const LABEL_VALUETYPES: &[&str] = &["title", "prefLabel", "altLabel", "hiddenLabel"];

/// Valuetypes stored as identifiers.
pub const IDENTIFIER_VALUETYPES: &[&str] = &["identifier"];

/// Valuetypes stored as statements.
pub const NOTE_VALUETYPES: &[&str] = &[
    "note",
    "changeNote",
    "definition",
    "description",
    "editorialNote",
    "example",
    "historyNote",
    "scopeNote",
];

/// Where a valuetype lands, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCategory {
    Label,
    Identifier,
    Statement,
}

impl ValueCategory {
    pub fn of(valuetype: &str) -> Option<Self> {
        if LABEL_VALUETYPES.contains(&valuetype) {
            Some(ValueCategory::Label)
        } else if IDENTIFIER_VALUETYPES.contains(&valuetype) {
            Some(ValueCategory::Identifier)
        } else if NOTE_VALUETYPES.contains(&valuetype) {
            Some(ValueCategory::Statement)
        } else {
            None
        }
    }
}

/// Node aliases of the statement nodegroup; schemes use the `_n1` variants.
pub struct StatementAliases {
    pub content: &'static str,
    pub kind: &'static str,
    pub language: &'static str,
}

pub fn statement_aliases(resource: ResourceKind) -> StatementAliases {
    match resource {
        ResourceKind::Scheme => StatementAliases {
            content: "statement_content_n1",
            kind: "statement_type_n1",
            language: "statement_language_n1",
        },
        ResourceKind::Concept => StatementAliases {
            content: "statement_content",
            kind: "statement_type",
            language: "statement_language",
        },
    }
}

fn language_name(code: Option<&str>, languages: &LanguageLookup) -> JsonValue {
    match code {
        Some(code) => json!(languages.name_for(code).unwrap_or(code)),
        None => JsonValue::Null,
    }
}

/// Map one labelled value to a mock tile, or `None` if its valuetype has no
/// destination.
pub fn map_value(
    value: &SourceValue,
    resource: ResourceKind,
    languages: &LanguageLookup,
) -> Option<MockTile> {
    let category = ValueCategory::of(&value.valuetype)?;
    let language = language_name(value.language.as_deref(), languages);

    let tile = match category {
        ValueCategory::Label => {
            let relation = if value.valuetype == "title" {
                "prefLabel"
            } else {
                value.valuetype.as_str()
            };
            MockTile::new(NodegroupKind::AppellativeStatus)
                .with("appellative_status_ascribed_name_content", json!(value.value))
                .with("appellative_status_ascribed_name_language", language)
                .with("appellative_status_ascribed_relation", json!(relation))
        }
        ValueCategory::Identifier => MockTile::new(NodegroupKind::Identifier)
            .with("identifier_content", json!(value.value))
            .with("identifier_type", json!(value.valuetype)),
        ValueCategory::Statement => {
            let aliases = statement_aliases(resource);
            MockTile::new(NodegroupKind::Statement)
                .with(aliases.content, json!(value.value))
                .with(aliases.kind, json!(value.valuetype))
                .with(aliases.language, language)
        }
    };
    Some(tile)
}

/// Apply the unmapped policy to a value that [`map_value`] dropped.
pub fn handle_unmapped(
    resource_id: Uuid,
    valuetype: &str,
    policy: UnmappedPolicy,
) -> Result<()> {
    match policy {
        UnmappedPolicy::Skip => {
            debug!(
                subsystem = "core",
                component = "mapper",
                resource_id = %resource_id,
                valuetype,
                "Dropping value with unmapped valuetype"
            );
            Ok(())
        }
        UnmappedPolicy::Reject => Err(Error::InvalidInput(format!(
            "Valuetype '{}' on resource {} has no tile mapping",
            valuetype, resource_id
        ))),
    }
}

/// Structural relationship between two resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
    TopConceptOf,
    PartOfScheme,
    Broader,
    Related,
}

impl Relationship {
    pub fn nodegroup(&self) -> NodegroupKind {
        match self {
            Relationship::TopConceptOf => NodegroupKind::TopConceptOf,
            Relationship::PartOfScheme => NodegroupKind::PartOfScheme,
            Relationship::Broader => NodegroupKind::ClassificationStatus,
            Relationship::Related => NodegroupKind::RelationStatus,
        }
    }

    /// Node holding the referenced resource.
    pub fn node_alias(&self) -> &'static str {
        match self {
            Relationship::TopConceptOf => "top_concept_of",
            Relationship::PartOfScheme => "part_of_scheme",
            Relationship::Broader => "classification_status_ascribed_classification",
            Relationship::Related => "relation_status_ascribed_comparate",
        }
    }
}

/// A resource-instance reference as stored in relationship tiles.
pub fn resource_reference(resource_id: Uuid) -> JsonValue {
    json!({
        "resourceId": resource_id.to_string(),
        "ontologyProperty": "",
        "resourceXresourceId": "",
        "inverseOntologyProperty": "",
    })
}

/// Map a relationship to a mock tile referencing `target`.
pub fn map_relationship(relationship: Relationship, target: Uuid) -> MockTile {
    MockTile::new(relationship.nodegroup())
        .with(relationship.node_alias(), json!([resource_reference(target)]))
}

/// Map a SKOS matching relation to a statement whose type is the predicate.
pub fn map_match(
    predicate: &str,
    matched_identifier: &str,
    resource: ResourceKind,
) -> MockTile {
    let aliases = statement_aliases(resource);
    MockTile::new(NodegroupKind::Statement)
        .with(aliases.content, json!(matched_identifier))
        .with(aliases.kind, json!(predicate))
        .with(aliases.language, JsonValue::Null)
}

/// Resource ids referenced by a relationship tile field value.
pub fn referenced_resources(value: &JsonValue) -> Vec<Uuid> {
    let one = |v: &JsonValue| {
        v.get("resourceId")
            .and_then(|id| id.as_str())
            .and_then(|id| Uuid::parse_str(id).ok())
    };
    match value {
        JsonValue::Array(items) => items.iter().filter_map(one).collect(),
        JsonValue::Object(_) => one(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

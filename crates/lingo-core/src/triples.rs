//! Tile → triple extraction.
//!
//! A static table keyed by `(ResourceKind, NodegroupKind)` says which node of
//! a tile supplies the predicate, which the object and which the language.
//! Nodegroups without an entry (the synchronizer's `uri` tiles) are not
//! exported.

use oxrdf::NamedNode;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::lookups::reference_label;
use crate::mapper::referenced_resources;
use crate::models::{MockTile, NodegroupKind, ResourceKind};
use crate::skos::vocab;

/// Where the predicate of an extracted triple comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateSource {
    /// A reference node whose preferred label is the predicate name, with a
    /// fallback when the node is empty.
    Node {
        alias: &'static str,
        default: Option<&'static str>,
    },
    /// Fixed structural predicate.
    Structural(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripleMapping {
    pub predicate: PredicateSource,
    pub object: &'static str,
    pub language: Option<&'static str>,
}

const fn node(alias: &'static str) -> PredicateSource {
    PredicateSource::Node {
        alias,
        default: None,
    }
}

/// Mapping for a nodegroup of a resource kind.
pub fn mapping(resource: ResourceKind, nodegroup: NodegroupKind) -> Option<TripleMapping> {
    use NodegroupKind::*;
    let mapping = match (resource, nodegroup) {
        (_, AppellativeStatus) => TripleMapping {
            predicate: node("appellative_status_ascribed_relation"),
            object: "appellative_status_ascribed_name_content",
            language: Some("appellative_status_ascribed_name_language"),
        },
        (_, Identifier) => TripleMapping {
            predicate: node("identifier_type"),
            object: "identifier_content",
            language: None,
        },
        (ResourceKind::Scheme, Statement) => TripleMapping {
            predicate: node("statement_type_n1"),
            object: "statement_content_n1",
            language: Some("statement_language_n1"),
        },
        (ResourceKind::Concept, Statement) => TripleMapping {
            predicate: node("statement_type"),
            object: "statement_content",
            language: Some("statement_language"),
        },
        (ResourceKind::Concept, TopConceptOf) => TripleMapping {
            predicate: PredicateSource::Structural("hasTopConcept"),
            object: "top_concept_of",
            language: None,
        },
        (ResourceKind::Concept, PartOfScheme) => TripleMapping {
            predicate: PredicateSource::Structural("inScheme"),
            object: "part_of_scheme",
            language: None,
        },
        (ResourceKind::Concept, ClassificationStatus) => TripleMapping {
            predicate: PredicateSource::Node {
                alias: "classification_status_ascribed_relation",
                default: Some("broader"),
            },
            object: "classification_status_ascribed_classification",
            language: None,
        },
        (ResourceKind::Concept, RelationStatus) => TripleMapping {
            predicate: PredicateSource::Node {
                alias: "relation_status_ascribed_relation",
                default: Some("related"),
            },
            object: "relation_status_ascribed_comparate",
            language: None,
        },
        (ResourceKind::Scheme, _) | (_, Uri) => return None,
    };
    Some(mapping)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripleObject {
    Literal(String),
    Resource(Uuid),
}

/// A triple of one resource, before subject/predicate IRIs are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTriple {
    /// Predicate name, e.g. `prefLabel`, `identifier`, `hasTopConcept`.
    pub predicate: String,
    pub object: TripleObject,
    /// Language as stored on the tile (a language name).
    pub object_language: Option<String>,
}

impl ExtractedTriple {
    pub fn is_structural(&self) -> bool {
        matches!(self.predicate.as_str(), "hasTopConcept" | "inScheme")
    }
}

fn literal_of(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) if s.is_empty() => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        other => reference_label(other),
    }
}

/// Triples for the tiles of one nodegroup.
pub fn extract_triples(
    resource: ResourceKind,
    nodegroup: NodegroupKind,
    tiles: &[&MockTile],
) -> Vec<ExtractedTriple> {
    let Some(mapping) = mapping(resource, nodegroup) else {
        return Vec::new();
    };

    let mut triples = Vec::new();
    for tile in tiles.iter().filter(|t| t.nodegroup == nodegroup) {
        let predicate = match mapping.predicate {
            PredicateSource::Structural(name) => Some(name.to_string()),
            PredicateSource::Node { alias, default } => tile
                .get(alias)
                .and_then(literal_of)
                .or_else(|| default.map(str::to_string)),
        };
        let (Some(predicate), Some(object)) = (predicate, tile.get(mapping.object)) else {
            continue;
        };

        let resources = referenced_resources(object);
        if !resources.is_empty() {
            triples.extend(resources.into_iter().map(|id| ExtractedTriple {
                predicate: predicate.clone(),
                object: TripleObject::Resource(id),
                object_language: None,
            }));
            continue;
        }

        if let Some(literal) = literal_of(object) {
            let object_language = mapping
                .language
                .and_then(|alias| tile.get(alias))
                .and_then(literal_of);
            triples.push(ExtractedTriple {
                predicate,
                object: TripleObject::Literal(literal),
                object_language,
            });
        }
    }
    triples
}

/// Triples for every tile of a resource, in nodegroup order.
pub fn extract_all(resource: ResourceKind, tiles: &[MockTile]) -> Vec<ExtractedTriple> {
    let refs: Vec<&MockTile> = tiles.iter().collect();
    NodegroupKind::ALL
        .iter()
        .flat_map(|ng| extract_triples(resource, *ng, &refs))
        .collect()
}

/// IRI for an extracted predicate name.
pub fn predicate_iri(predicate: &str) -> NamedNode {
    match predicate {
        "identifier" => vocab::dcterms("identifier"),
        other => vocab::skos(other),
    }
}

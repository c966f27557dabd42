//! Node/nodegroup metadata for the scheme and concept resource models.
//!
//! The staging engine resolves every mock-tile field through a [`GraphModel`]
//! to find the node id, datatype and datatype config. The built-in models
//! returned by [`GraphModel::lingo_schemes`] and [`GraphModel::lingo_concepts`]
//! match the graphs installed by the SQL migrations; `lingo-db` can also load
//! a model from the `nodes`/`node_groups` tables.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::{uuid, Uuid};

use crate::lookups::lists;
use crate::models::{NodegroupKind, ResourceKind};

// =============================================================================
// GRAPH IDS
// =============================================================================

pub const CONCEPTS_GRAPH_ID: Uuid = uuid!("bf73e576-4888-11ee-8a8d-11afefc4bff7");
pub const SCHEMES_GRAPH_ID: Uuid = uuid!("56788995-423b-11ee-8a8d-11afefc4bff7");

/// Node ids referenced directly by set-oriented SQL and the synchronizer.
pub mod nodes {
    use uuid::{uuid, Uuid};

    // Concept: appellative_status
    pub const CONCEPT_NAME_NODEGROUP: Uuid = uuid!("ab9fee9c-0eb6-11ef-93db-0a58a9feac02");
    pub const CONCEPT_NAME_CONTENT: Uuid = uuid!("7357993a-0eb7-11ef-93db-0a58a9feac02");
    pub const CONCEPT_NAME_LANGUAGE: Uuid = uuid!("a8ecaf54-0eb7-11ef-93db-0a58a9feac02");
    pub const CONCEPT_NAME_TYPE: Uuid = uuid!("1ddffab4-0eb8-11ef-93db-0a58a9feac02");

    // Concept: identifier
    pub const CONCEPT_IDENTIFIER_NODEGROUP: Uuid = uuid!("e6c5ff33-0eb8-11ef-93db-0a58a9feac02");
    pub const CONCEPT_IDENTIFIER_CONTENT: Uuid = uuid!("e6c60118-0eb8-11ef-93db-0a58a9feac02");
    pub const CONCEPT_IDENTIFIER_TYPE: Uuid = uuid!("e6c6025e-0eb8-11ef-93db-0a58a9feac02");

    // Concept: statement
    pub const CONCEPT_STATEMENT_NODEGROUP: Uuid = uuid!("1f8b6a44-0eb9-11ef-93db-0a58a9feac02");
    pub const CONCEPT_STATEMENT_CONTENT: Uuid = uuid!("1f8b6c1a-0eb9-11ef-93db-0a58a9feac02");
    pub const CONCEPT_STATEMENT_TYPE: Uuid = uuid!("1f8b6d46-0eb9-11ef-93db-0a58a9feac02");
    pub const CONCEPT_STATEMENT_LANGUAGE: Uuid = uuid!("1f8b6e72-0eb9-11ef-93db-0a58a9feac02");

    // Concept: structural relationships
    pub const TOP_CONCEPT_OF: Uuid = uuid!("bf73e5b9-4888-11ee-8a8d-11afefc4bff7");
    pub const PART_OF_SCHEME: Uuid = uuid!("bf73e60a-4888-11ee-8a8d-11afefc4bff7");

    // Concept: classification_status
    pub const CLASSIFICATION_STATUS_NODEGROUP: Uuid =
        uuid!("f3f7bbea-0eb9-11ef-93db-0a58a9feac02");
    pub const CLASSIFICATION_STATUS_ASCRIBED_CLASSIFICATION: Uuid =
        uuid!("0b531a82-0eba-11ef-93db-0a58a9feac02");
    pub const CLASSIFICATION_STATUS_ASCRIBED_RELATION: Uuid =
        uuid!("70c66e14-0eba-11ef-93db-0a58a9feac02");
    pub const CLASSIFICATION_STATUS_TYPE: Uuid = uuid!("734ef3e4-0ebb-11ef-93db-0a58a9feac02");
    pub const CLASSIFICATION_STATUS_TYPE_METATYPE: Uuid =
        uuid!("8f32ed04-0ebb-11ef-93db-0a58a9feac02");
    pub const CLASSIFICATION_STATUS_ASSIGNMENT_ACTOR: Uuid =
        uuid!("d728d3ac-0ebc-11ef-93db-0a58a9feac02");
    pub const CLASSIFICATION_STATUS_ASSIGNMENT_OBJ_USED: Uuid =
        uuid!("d728d49c-0ebc-11ef-93db-0a58a9feac02");
    pub const CLASSIFICATION_STATUS_ASSIGNMENT_TYPE: Uuid =
        uuid!("defdcb92-1771-11ef-b270-0a58a9feac02");
    pub const CLASSIFICATION_STATUS_TIMESPAN_END_OF_END: Uuid =
        uuid!("c86ec544-0eba-11ef-93db-0a58a9feac02");
    pub const CLASSIFICATION_STATUS_TIMESPAN_BEGIN_OF_BEGIN: Uuid =
        uuid!("f92a16de-0eba-11ef-93db-0a58a9feac02");

    // Concept: relation_status
    pub const RELATION_STATUS_NODEGROUP: Uuid = uuid!("5e0ea2c4-0ebd-11ef-93db-0a58a9feac02");
    pub const RELATION_STATUS_ASCRIBED_COMPARATE: Uuid =
        uuid!("5e0ea52e-0ebd-11ef-93db-0a58a9feac02");
    pub const RELATION_STATUS_ASCRIBED_RELATION: Uuid =
        uuid!("5e0ea67a-0ebd-11ef-93db-0a58a9feac02");
    pub const RELATION_STATUS_STATUS: Uuid = uuid!("5e0ea7b0-0ebd-11ef-93db-0a58a9feac02");
    pub const RELATION_STATUS_STATUS_METATYPE: Uuid =
        uuid!("5e0ea8dc-0ebd-11ef-93db-0a58a9feac02");
    pub const RELATION_STATUS_TIMESPAN_BEGIN_OF_BEGIN: Uuid =
        uuid!("5e0eaa08-0ebd-11ef-93db-0a58a9feac02");
    pub const RELATION_STATUS_TIMESPAN_END_OF_END: Uuid =
        uuid!("5e0eab34-0ebd-11ef-93db-0a58a9feac02");
    pub const RELATION_STATUS_ASSIGNMENT_ACTOR: Uuid =
        uuid!("5e0eac60-0ebd-11ef-93db-0a58a9feac02");
    pub const RELATION_STATUS_ASSIGNMENT_OBJ_USED: Uuid =
        uuid!("5e0ead8c-0ebd-11ef-93db-0a58a9feac02");
    pub const RELATION_STATUS_ASSIGNMENT_TYPE: Uuid =
        uuid!("5e0eaeb8-0ebd-11ef-93db-0a58a9feac02");

    // Concept: uri
    pub const CONCEPT_URI_NODEGROUP: Uuid = uuid!("9a4b57c2-1771-11ef-b270-0a58a9feac02");
    pub const CONCEPT_URI_CONTENT: Uuid = uuid!("9a4b5a24-1771-11ef-b270-0a58a9feac02");

    // Scheme: appellative_status
    pub const SCHEME_NAME_NODEGROUP: Uuid = uuid!("ef87ac28-11de-11ef-9493-0a58a9feac02");
    pub const SCHEME_NAME_CONTENT: Uuid = uuid!("ef87b132-11de-11ef-9493-0a58a9feac02");
    pub const SCHEME_NAME_LANGUAGE: Uuid = uuid!("ef87b43e-11de-11ef-9493-0a58a9feac02");
    pub const SCHEME_NAME_TYPE: Uuid = uuid!("ef87b588-11de-11ef-9493-0a58a9feac02");

    // Scheme: identifier
    pub const SCHEME_IDENTIFIER_NODEGROUP: Uuid = uuid!("ef87b6c8-11de-11ef-9493-0a58a9feac02");
    pub const SCHEME_IDENTIFIER_CONTENT: Uuid = uuid!("ef87b7f4-11de-11ef-9493-0a58a9feac02");
    pub const SCHEME_IDENTIFIER_TYPE: Uuid = uuid!("ef87b920-11de-11ef-9493-0a58a9feac02");

    // Scheme: statement
    pub const SCHEME_STATEMENT_NODEGROUP: Uuid = uuid!("ef87ba4c-11de-11ef-9493-0a58a9feac02");
    pub const SCHEME_STATEMENT_CONTENT: Uuid = uuid!("ef87bb78-11de-11ef-9493-0a58a9feac02");
    pub const SCHEME_STATEMENT_TYPE: Uuid = uuid!("ef87bca4-11de-11ef-9493-0a58a9feac02");
    pub const SCHEME_STATEMENT_LANGUAGE: Uuid = uuid!("ef87bdd0-11de-11ef-9493-0a58a9feac02");

    // Scheme: uri
    pub const SCHEME_URI_NODEGROUP: Uuid = uuid!("ef87befc-11de-11ef-9493-0a58a9feac02");
    pub const SCHEME_URI_CONTENT: Uuid = uuid!("ef87c028-11de-11ef-9493-0a58a9feac02");
}

// =============================================================================
// MODEL TYPES
// =============================================================================

/// Nodegroup cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "n")]
    Many,
}

impl Cardinality {
    pub fn parse(raw: &str) -> Self {
        if raw == "1" {
            Cardinality::One
        } else {
            Cardinality::Many
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::One => "1",
            Cardinality::Many => "n",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodegroupDef {
    pub id: Uuid,
    pub alias: String,
    pub cardinality: Cardinality,
    pub parent_nodegroup_id: Option<Uuid>,
    pub depth: i32,
}

impl NodegroupDef {
    /// The known nodegroup this definition corresponds to, if any.
    pub fn kind(&self) -> Option<NodegroupKind> {
        self.alias.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: Uuid,
    pub alias: String,
    pub nodegroup_id: Uuid,
    pub datatype: String,
    pub config: JsonValue,
}

impl NodeDef {
    /// Controlled list id configured on a reference node.
    pub fn controlled_list(&self) -> Option<Uuid> {
        self.config
            .get("controlledList")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

/// Node metadata for one resource model.
#[derive(Debug, Clone)]
pub struct GraphModel {
    pub graph_id: Uuid,
    pub kind: ResourceKind,
    nodegroups: Vec<NodegroupDef>,
    nodes: Vec<NodeDef>,
    node_by_alias: HashMap<String, usize>,
    node_by_id: HashMap<Uuid, usize>,
    nodegroup_by_id: HashMap<Uuid, usize>,
}

impl GraphModel {
    pub fn new(
        graph_id: Uuid,
        kind: ResourceKind,
        nodegroups: Vec<NodegroupDef>,
        nodes: Vec<NodeDef>,
    ) -> Self {
        let node_by_alias = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.alias.clone(), i))
            .collect();
        let node_by_id = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        let nodegroup_by_id = nodegroups
            .iter()
            .enumerate()
            .map(|(i, ng)| (ng.id, i))
            .collect();
        Self {
            graph_id,
            kind,
            nodegroups,
            nodes,
            node_by_alias,
            node_by_id,
            nodegroup_by_id,
        }
    }

    pub fn node(&self, alias: &str) -> Option<&NodeDef> {
        self.node_by_alias.get(alias).map(|&i| &self.nodes[i])
    }

    pub fn node_by_id(&self, id: &Uuid) -> Option<&NodeDef> {
        self.node_by_id.get(id).map(|&i| &self.nodes[i])
    }

    pub fn nodegroup_by_id(&self, id: &Uuid) -> Option<&NodegroupDef> {
        self.nodegroup_by_id.get(id).map(|&i| &self.nodegroups[i])
    }

    pub fn nodegroup(&self, kind: NodegroupKind) -> Option<&NodegroupDef> {
        self.nodegroups.iter().find(|ng| ng.kind() == Some(kind))
    }

    pub fn nodes_in(&self, nodegroup_id: Uuid) -> impl Iterator<Item = &NodeDef> {
        self.nodes
            .iter()
            .filter(move |n| n.nodegroup_id == nodegroup_id)
    }

    pub fn nodegroups(&self) -> &[NodegroupDef] {
        &self.nodegroups
    }

    pub fn nodes(&self) -> &[NodeDef] {
        &self.nodes
    }

    /// Built-in model for the given resource kind.
    pub fn builtin(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Scheme => Self::lingo_schemes(),
            ResourceKind::Concept => Self::lingo_concepts(),
        }
    }

    /// Built-in scheme model.
    pub fn lingo_schemes() -> Self {
        use nodes::*;
        let nodegroups = vec![
            nodegroup(SCHEME_NAME_NODEGROUP, "appellative_status", Cardinality::Many),
            nodegroup(SCHEME_IDENTIFIER_NODEGROUP, "identifier", Cardinality::Many),
            nodegroup(SCHEME_STATEMENT_NODEGROUP, "statement", Cardinality::Many),
            nodegroup(SCHEME_URI_NODEGROUP, "uri", Cardinality::One),
        ];
        let nodes = vec![
            string_node(SCHEME_NAME_CONTENT, "appellative_status_ascribed_name_content", SCHEME_NAME_NODEGROUP),
            reference_node(SCHEME_NAME_LANGUAGE, "appellative_status_ascribed_name_language", SCHEME_NAME_NODEGROUP, lists::LANGUAGES),
            reference_node(SCHEME_NAME_TYPE, "appellative_status_ascribed_relation", SCHEME_NAME_NODEGROUP, lists::LABEL_TYPES),
            string_node(SCHEME_IDENTIFIER_CONTENT, "identifier_content", SCHEME_IDENTIFIER_NODEGROUP),
            reference_node(SCHEME_IDENTIFIER_TYPE, "identifier_type", SCHEME_IDENTIFIER_NODEGROUP, lists::IDENTIFIER_TYPES),
            string_node(SCHEME_STATEMENT_CONTENT, "statement_content_n1", SCHEME_STATEMENT_NODEGROUP),
            reference_node(SCHEME_STATEMENT_TYPE, "statement_type_n1", SCHEME_STATEMENT_NODEGROUP, lists::STATEMENT_TYPES),
            reference_node(SCHEME_STATEMENT_LANGUAGE, "statement_language_n1", SCHEME_STATEMENT_NODEGROUP, lists::LANGUAGES),
            node(SCHEME_URI_CONTENT, "uri_content", SCHEME_URI_NODEGROUP, "url", json!({})),
        ];
        Self::new(SCHEMES_GRAPH_ID, ResourceKind::Scheme, nodegroups, nodes)
    }

    /// Built-in concept model.
    pub fn lingo_concepts() -> Self {
        use nodes::*;
        let nodegroups = vec![
            nodegroup(CONCEPT_NAME_NODEGROUP, "appellative_status", Cardinality::Many),
            nodegroup(CONCEPT_IDENTIFIER_NODEGROUP, "identifier", Cardinality::Many),
            nodegroup(CONCEPT_STATEMENT_NODEGROUP, "statement", Cardinality::Many),
            nodegroup(TOP_CONCEPT_OF, "top_concept_of", Cardinality::One),
            nodegroup(PART_OF_SCHEME, "part_of_scheme", Cardinality::One),
            nodegroup(CLASSIFICATION_STATUS_NODEGROUP, "classification_status", Cardinality::Many),
            nodegroup(RELATION_STATUS_NODEGROUP, "relation_status", Cardinality::Many),
            nodegroup(CONCEPT_URI_NODEGROUP, "uri", Cardinality::One),
        ];
        let concepts = json!({"graphs": [{"graphid": CONCEPTS_GRAPH_ID}]});
        let schemes = json!({"graphs": [{"graphid": SCHEMES_GRAPH_ID}]});
        let nodes = vec![
            string_node(CONCEPT_NAME_CONTENT, "appellative_status_ascribed_name_content", CONCEPT_NAME_NODEGROUP),
            reference_node(CONCEPT_NAME_LANGUAGE, "appellative_status_ascribed_name_language", CONCEPT_NAME_NODEGROUP, lists::LANGUAGES),
            reference_node(CONCEPT_NAME_TYPE, "appellative_status_ascribed_relation", CONCEPT_NAME_NODEGROUP, lists::LABEL_TYPES),
            string_node(CONCEPT_IDENTIFIER_CONTENT, "identifier_content", CONCEPT_IDENTIFIER_NODEGROUP),
            reference_node(CONCEPT_IDENTIFIER_TYPE, "identifier_type", CONCEPT_IDENTIFIER_NODEGROUP, lists::IDENTIFIER_TYPES),
            string_node(CONCEPT_STATEMENT_CONTENT, "statement_content", CONCEPT_STATEMENT_NODEGROUP),
            reference_node(CONCEPT_STATEMENT_TYPE, "statement_type", CONCEPT_STATEMENT_NODEGROUP, lists::STATEMENT_TYPES),
            reference_node(CONCEPT_STATEMENT_LANGUAGE, "statement_language", CONCEPT_STATEMENT_NODEGROUP, lists::LANGUAGES),
            node(TOP_CONCEPT_OF, "top_concept_of", TOP_CONCEPT_OF, "resource-instance-list", schemes.clone()),
            node(PART_OF_SCHEME, "part_of_scheme", PART_OF_SCHEME, "resource-instance", schemes),
            node(CLASSIFICATION_STATUS_ASCRIBED_CLASSIFICATION, "classification_status_ascribed_classification", CLASSIFICATION_STATUS_NODEGROUP, "resource-instance-list", concepts.clone()),
            reference_node(CLASSIFICATION_STATUS_ASCRIBED_RELATION, "classification_status_ascribed_relation", CLASSIFICATION_STATUS_NODEGROUP, lists::RELATION_TYPES),
            reference_node(CLASSIFICATION_STATUS_TYPE, "classification_status_type", CLASSIFICATION_STATUS_NODEGROUP, lists::RELATION_TYPES),
            reference_node(CLASSIFICATION_STATUS_TYPE_METATYPE, "classification_status_type_metatype", CLASSIFICATION_STATUS_NODEGROUP, lists::RELATION_TYPES),
            node(CLASSIFICATION_STATUS_ASSIGNMENT_ACTOR, "classification_status_data_assignment_actor", CLASSIFICATION_STATUS_NODEGROUP, "resource-instance-list", json!({})),
            node(CLASSIFICATION_STATUS_ASSIGNMENT_OBJ_USED, "classification_status_data_assignment_object_used", CLASSIFICATION_STATUS_NODEGROUP, "resource-instance-list", json!({})),
            reference_node(CLASSIFICATION_STATUS_ASSIGNMENT_TYPE, "classification_status_data_assignment_type", CLASSIFICATION_STATUS_NODEGROUP, lists::RELATION_TYPES),
            node(CLASSIFICATION_STATUS_TIMESPAN_END_OF_END, "classification_status_timespan_end_of_the_end", CLASSIFICATION_STATUS_NODEGROUP, "date", json!({})),
            node(CLASSIFICATION_STATUS_TIMESPAN_BEGIN_OF_BEGIN, "classification_status_timespan_begin_of_the_begin", CLASSIFICATION_STATUS_NODEGROUP, "date", json!({})),
            node(RELATION_STATUS_ASCRIBED_COMPARATE, "relation_status_ascribed_comparate", RELATION_STATUS_NODEGROUP, "resource-instance-list", concepts),
            reference_node(RELATION_STATUS_ASCRIBED_RELATION, "relation_status_ascribed_relation", RELATION_STATUS_NODEGROUP, lists::RELATION_TYPES),
            reference_node(RELATION_STATUS_STATUS, "relation_status_status", RELATION_STATUS_NODEGROUP, lists::RELATION_TYPES),
            reference_node(RELATION_STATUS_STATUS_METATYPE, "relation_status_status_metatype", RELATION_STATUS_NODEGROUP, lists::RELATION_TYPES),
            node(RELATION_STATUS_TIMESPAN_BEGIN_OF_BEGIN, "relation_status_timespan_begin_of_the_begin", RELATION_STATUS_NODEGROUP, "date", json!({})),
            node(RELATION_STATUS_TIMESPAN_END_OF_END, "relation_status_timespan_end_of_the_end", RELATION_STATUS_NODEGROUP, "date", json!({})),
            node(RELATION_STATUS_ASSIGNMENT_ACTOR, "relation_status_data_assignment_actor", RELATION_STATUS_NODEGROUP, "resource-instance-list", json!({})),
            node(RELATION_STATUS_ASSIGNMENT_OBJ_USED, "relation_status_data_assignment_object_used", RELATION_STATUS_NODEGROUP, "resource-instance-list", json!({})),
            reference_node(RELATION_STATUS_ASSIGNMENT_TYPE, "relation_status_data_assignment_type", RELATION_STATUS_NODEGROUP, lists::RELATION_TYPES),
            node(CONCEPT_URI_CONTENT, "uri_content", CONCEPT_URI_NODEGROUP, "url", json!({})),
        ];
        Self::new(CONCEPTS_GRAPH_ID, ResourceKind::Concept, nodegroups, nodes)
    }
}

fn nodegroup(id: Uuid, alias: &str, cardinality: Cardinality) -> NodegroupDef {
    NodegroupDef {
        id,
        alias: alias.to_string(),
        cardinality,
        parent_nodegroup_id: None,
        depth: 0,
    }
}

fn node(id: Uuid, alias: &str, nodegroup_id: Uuid, datatype: &str, config: JsonValue) -> NodeDef {
    NodeDef {
        id,
        alias: alias.to_string(),
        nodegroup_id,
        datatype: datatype.to_string(),
        config,
    }
}

fn string_node(id: Uuid, alias: &str, nodegroup_id: Uuid) -> NodeDef {
    node(id, alias, nodegroup_id, "non-localized-string", json!({}))
}

fn reference_node(id: Uuid, alias: &str, nodegroup_id: Uuid, list: Uuid) -> NodeDef {
    node(
        id,
        alias,
        nodegroup_id,
        "reference",
        json!({"controlledList": list, "multiValue": false}),
    )
}

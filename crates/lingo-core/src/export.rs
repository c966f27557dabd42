//! Export views over loaded resources.
//!
//! An [`ExportView`] is an owned, already-rewritten set of resources ready
//! for the SKOS writer. Building a partial view clones what it keeps and
//! never touches the resources it was built from.

use std::collections::HashSet;

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::graph_model::GraphModel;
use crate::hierarchy::{HierarchyEdge, HierarchyExtractor};
use crate::mapper::{map_relationship, referenced_resources, statement_aliases, Relationship};
use crate::models::{MockTile, NodegroupKind, ResourceKind, ResourceToLoad, Tile};

/// A resource with its tiles keyed by node alias.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResource {
    pub resource_id: Uuid,
    pub kind: ResourceKind,
    pub tiles: Vec<MockTile>,
}

impl ExportResource {
    pub fn new(resource_id: Uuid, kind: ResourceKind, tiles: Vec<MockTile>) -> Self {
        Self {
            resource_id,
            kind,
            tiles,
        }
    }

    /// Re-key committed tiles by alias using the resource's graph model.
    ///
    /// Tiles of nodegroups the model does not know, and values of unknown
    /// nodes, are left out.
    pub fn from_tiles(resource_id: Uuid, model: &GraphModel, tiles: &[Tile]) -> Self {
        let mut ordered: Vec<&Tile> = tiles
            .iter()
            .filter(|t| t.resource_id == resource_id)
            .collect();
        ordered.sort_by_key(|t| (t.nodegroup_id, t.sortorder));

        let mut aliased = Vec::with_capacity(ordered.len());
        for tile in ordered {
            let Some(kind) = model
                .nodegroup_by_id(&tile.nodegroup_id)
                .and_then(|ng| ng.kind())
            else {
                debug!(
                    subsystem = "core",
                    component = "export",
                    tile_id = %tile.tile_id,
                    nodegroup = %tile.nodegroup_id,
                    "Skipping tile of unknown nodegroup"
                );
                continue;
            };
            let mut mock = MockTile::new(kind);
            for (node_id, value) in &tile.data {
                if let Some(node) = model.node_by_id(node_id) {
                    mock.fields.insert(node.alias.clone(), value.clone());
                }
            }
            aliased.push(mock);
        }
        Self::new(resource_id, model.kind, aliased)
    }

    /// View of an in-memory resource, before staging.
    pub fn from_load(resource: &ResourceToLoad) -> Self {
        Self::new(resource.resource_id, resource.kind, resource.tiles.clone())
    }

    pub fn tiles_of(&self, nodegroup: NodegroupKind) -> impl Iterator<Item = &MockTile> {
        self.tiles.iter().filter(move |t| t.nodegroup == nodegroup)
    }

    /// Resources referenced through a relationship nodegroup.
    pub fn references(&self, relationship: Relationship) -> Vec<Uuid> {
        self.tiles_of(relationship.nodegroup())
            .filter_map(|t| t.get(relationship.node_alias()))
            .flat_map(referenced_resources)
            .collect()
    }

    /// Scheme the concept belongs to.
    pub fn scheme(&self) -> Option<Uuid> {
        self.references(Relationship::PartOfScheme).first().copied()
    }

    fn without(mut self, nodegroups: &[NodegroupKind]) -> Self {
        self.tiles.retain(|t| !nodegroups.contains(&t.nodegroup));
        self
    }
}

/// Parent → child edges found in concept tiles: scheme → top concept from
/// `top_concept_of`, broader → narrower from `classification_status`.
pub fn hierarchy_edges(resources: &[ExportResource]) -> Vec<HierarchyEdge> {
    resources
        .iter()
        .filter(|r| r.kind == ResourceKind::Concept)
        .flat_map(|r| {
            let tops = r
                .references(Relationship::TopConceptOf)
                .into_iter()
                .map(move |scheme| HierarchyEdge::new(scheme, r.resource_id));
            let broader = r
                .references(Relationship::Broader)
                .into_iter()
                .map(move |parent| HierarchyEdge::new(parent, r.resource_id));
            tops.chain(broader)
        })
        .collect()
}

/// Resources to export, the scheme first.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportView {
    pub scheme_id: Uuid,
    pub resources: Vec<ExportResource>,
}

impl ExportView {
    /// A scheme and every concept that is part of it.
    pub fn full(scheme_id: Uuid, resources: &[ExportResource]) -> Result<Self> {
        let scheme = resources
            .iter()
            .find(|r| r.resource_id == scheme_id && r.kind == ResourceKind::Scheme)
            .ok_or_else(|| Error::NotFound(format!("Scheme {} not found", scheme_id)))?;

        let mut kept = vec![scheme.clone()];
        kept.extend(
            resources
                .iter()
                .filter(|r| r.kind == ResourceKind::Concept && r.scheme() == Some(scheme_id))
                .cloned(),
        );
        Ok(Self {
            scheme_id,
            resources: kept,
        })
    }

    /// The hierarchy below `concept_id`, with the concept promoted to a
    /// scheme.
    ///
    /// Direct children become its top concepts; every retained descendant is
    /// re-pointed at it as its scheme.
    pub fn partial(concept_id: Uuid, resources: &[ExportResource]) -> Result<Self> {
        let concept = resources
            .iter()
            .find(|r| r.resource_id == concept_id && r.kind == ResourceKind::Concept)
            .ok_or_else(|| Error::NotFound(format!("Concept {} not found", concept_id)))?;
        let scheme_id = concept.scheme().ok_or_else(|| {
            Error::NotFound(format!("Concept {} is not part of a scheme", concept_id))
        })?;

        let members: Vec<ExportResource> = resources
            .iter()
            .filter(|r| r.kind == ResourceKind::Concept && r.scheme() == Some(scheme_id))
            .cloned()
            .collect();
        let hierarchy = HierarchyExtractor::new(hierarchy_edges(&members)).extract(scheme_id)?;
        let (direct, indirect) = hierarchy.descendants(concept_id);
        let retained: HashSet<Uuid> = direct.iter().chain(indirect.iter()).copied().collect();

        let mut view = vec![synthetic_scheme(concept)];
        for member in &members {
            if direct.contains(&member.resource_id) {
                let mut child = member.clone().without(&[
                    NodegroupKind::TopConceptOf,
                    NodegroupKind::PartOfScheme,
                    NodegroupKind::ClassificationStatus,
                ]);
                child
                    .tiles
                    .push(map_relationship(Relationship::TopConceptOf, concept_id));
                child
                    .tiles
                    .push(map_relationship(Relationship::PartOfScheme, concept_id));
                view.push(child);
            } else if indirect.contains(&member.resource_id) {
                let mut descendant = member
                    .clone()
                    .without(&[NodegroupKind::TopConceptOf, NodegroupKind::PartOfScheme]);
                descendant.tiles.retain(|t| {
                    t.nodegroup != NodegroupKind::ClassificationStatus
                        || t.get(Relationship::Broader.node_alias())
                            .map(referenced_resources)
                            .unwrap_or_default()
                            .iter()
                            .any(|parent| retained.contains(parent))
                });
                descendant
                    .tiles
                    .push(map_relationship(Relationship::PartOfScheme, concept_id));
                view.push(descendant);
            }
        }

        info!(
            subsystem = "core",
            component = "export",
            op = "partial",
            concept_id = %concept_id,
            scheme_id = %scheme_id,
            direct_count = direct.len(),
            indirect_count = indirect.len(),
            "Built partial export view"
        );
        Ok(Self {
            scheme_id: concept_id,
            resources: view,
        })
    }

    pub fn scheme(&self) -> Option<&ExportResource> {
        self.resources.first()
    }

    pub fn concepts(&self) -> impl Iterator<Item = &ExportResource> {
        self.resources
            .iter()
            .filter(|r| r.kind == ResourceKind::Concept)
    }
}

/// Clone a concept as a scheme: relationships dropped, statements moved to
/// the scheme's node aliases.
fn synthetic_scheme(concept: &ExportResource) -> ExportResource {
    let mut root = concept.clone().without(&[
        NodegroupKind::TopConceptOf,
        NodegroupKind::PartOfScheme,
        NodegroupKind::ClassificationStatus,
        NodegroupKind::RelationStatus,
        NodegroupKind::Uri,
    ]);
    root.kind = ResourceKind::Scheme;

    let from = statement_aliases(ResourceKind::Concept);
    let to = statement_aliases(ResourceKind::Scheme);
    for tile in root
        .tiles
        .iter_mut()
        .filter(|t| t.nodegroup == NodegroupKind::Statement)
    {
        for (old, new) in [
            (from.content, to.content),
            (from.kind, to.kind),
            (from.language, to.language),
        ] {
            let value = tile.fields.remove(old).unwrap_or(json!(null));
            tile.fields.insert(new.to_string(), value);
        }
    }
    root
}

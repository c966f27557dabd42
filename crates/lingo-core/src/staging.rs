//! Staging and validation of mock tiles.
//!
//! [`StagingEngine::stage`] turns resources with mock tiles into staging rows
//! and load errors. Each field is resolved to its node and run through its
//! datatype plugin; a row passes only if every field does. Validation
//! failures never abort staging: they are collected so the whole load can be
//! reported and then either promoted or rejected as a unit.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::datatypes::DatatypeRegistry;
use crate::error::{Error, Result};
use crate::graph_model::{Cardinality, GraphModel};
use crate::lookups::MigrationContext;
use crate::models::{
    LoadError, LoadErrorKind, MockTile, NodegroupKind, ResourceToLoad, StagingOperation,
    StagingRow, Tile, UnmappedPolicy,
};

/// Output of one staging pass.
#[derive(Debug, Clone, Default)]
pub struct StagingBatch {
    pub load_id: Uuid,
    pub rows: Vec<StagingRow>,
    pub errors: Vec<LoadError>,
}

impl StagingBatch {
    pub fn new(load_id: Uuid) -> Self {
        Self {
            load_id,
            rows: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.passes_validation).count()
    }

    /// Whether the batch may be promoted.
    pub fn passes(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn extend(&mut self, other: StagingBatch) {
        self.rows.extend(other.rows);
        self.errors.extend(other.errors);
    }

    /// Committed tiles for every row, in staging order.
    ///
    /// Callers promote only batches that pass; this does not filter.
    pub fn to_tiles(&self) -> Vec<Tile> {
        self.rows
            .iter()
            .map(|row| Tile {
                tile_id: row.tile_id,
                resource_id: row.resource_id,
                nodegroup_id: row.nodegroup_id,
                parent_tile_id: row.parent_tile_id,
                sortorder: row.sortorder,
                data: row.tile_data(),
            })
            .collect()
    }

    /// Fail every row beyond the first on a cardinality-one nodegroup of the
    /// same resource.
    pub fn enforce_cardinality(&mut self, ctx: &MigrationContext) {
        let mut seen: HashMap<(Uuid, Uuid), usize> = HashMap::new();
        for row in &self.rows {
            *seen.entry((row.resource_id, row.nodegroup_id)).or_default() += 1;
        }
        for row in &mut self.rows {
            let count = seen
                .get(&(row.resource_id, row.nodegroup_id))
                .copied()
                .unwrap_or(0);
            if count < 2 {
                continue;
            }
            let cardinality_one = [&ctx.schemes, &ctx.concepts].iter().any(|g| {
                g.nodegroup_by_id(&row.nodegroup_id)
                    .is_some_and(|ng| ng.cardinality == Cardinality::One)
            });
            if !cardinality_one {
                continue;
            }
            let message = format!(
                "Nodegroup {} allows one tile per resource, {} staged for {}",
                row.nodegroup_id, count, row.resource_id
            );
            row.passes_validation = false;
            row.error_message = Some(message.clone());
            self.errors.push(LoadError {
                kind: LoadErrorKind::Tile,
                load_id: self.load_id,
                value: None,
                source: row.source_description.clone(),
                error: "Cardinality violation".to_string(),
                message,
                datatype: None,
                node_id: None,
                nodegroup_id: Some(row.nodegroup_id),
            });
        }
    }
}

/// Stages resources for one load.
pub struct StagingEngine<'a> {
    load_id: Uuid,
    ctx: &'a MigrationContext,
    registry: &'a DatatypeRegistry,
}

impl<'a> StagingEngine<'a> {
    pub fn new(load_id: Uuid, ctx: &'a MigrationContext, registry: &'a DatatypeRegistry) -> Self {
        Self {
            load_id,
            ctx,
            registry,
        }
    }

    /// Stage every mock tile of every resource, then check cardinality.
    pub fn stage(&self, resources: &[ResourceToLoad]) -> Result<StagingBatch> {
        let mut batch = StagingBatch::new(self.load_id);
        let mut sortorders: HashMap<(Uuid, NodegroupKind), i32> = HashMap::new();

        for resource in resources {
            let graph = self.ctx.graph(resource.kind);
            for tile in &resource.tiles {
                let counter = sortorders
                    .entry((resource.resource_id, tile.nodegroup))
                    .or_insert(0);
                let sortorder = *counter;
                *counter += 1;

                let (row, errors) = self.stage_tile(graph, resource, tile, sortorder)?;
                batch.rows.push(row);
                batch.errors.extend(errors);
            }
        }

        batch.enforce_cardinality(self.ctx);

        let failed = batch.failed_count();
        if failed > 0 {
            warn!(
                subsystem = "core",
                component = "staging",
                op = "stage",
                load_id = %self.load_id,
                row_count = batch.rows.len(),
                failed_count = failed,
                "Staged rows failed validation"
            );
        } else {
            info!(
                subsystem = "core",
                component = "staging",
                op = "stage",
                load_id = %self.load_id,
                resource_count = resources.len(),
                row_count = batch.rows.len(),
                "Resources staged"
            );
        }
        Ok(batch)
    }

    fn stage_tile(
        &self,
        graph: &GraphModel,
        resource: &ResourceToLoad,
        tile: &MockTile,
        sortorder: i32,
    ) -> Result<(StagingRow, Vec<LoadError>)> {
        let nodegroup = graph.nodegroup(tile.nodegroup).ok_or_else(|| {
            Error::Config(format!(
                "The {} model has no {} nodegroup",
                resource.kind, tile.nodegroup
            ))
        })?;
        let source_description = format!("{}: {}", resource.kind, tile.nodegroup);

        let mut value = std::collections::BTreeMap::new();
        let mut errors = Vec::new();
        let mut passes = true;

        for (alias, source) in &tile.fields {
            let Some(node) = graph.node(alias).filter(|n| n.nodegroup_id == nodegroup.id) else {
                match self.ctx.unmapped_policy {
                    UnmappedPolicy::Skip => {
                        debug!(
                            subsystem = "core",
                            component = "staging",
                            nodegroup = %tile.nodegroup,
                            node_alias = alias.as_str(),
                            "Skipping field with no node in the model"
                        );
                    }
                    UnmappedPolicy::Reject => {
                        passes = false;
                        errors.push(self.node_error(
                            &source_description,
                            source,
                            "Unknown node",
                            format!("No node '{}' in nodegroup {}", alias, tile.nodegroup),
                            None,
                            None,
                            nodegroup.id,
                        ));
                    }
                }
                continue;
            };

            let (staged, field_errors) = self.registry.prepare(node, source, &self.ctx.lists)?;
            if !staged.valid {
                passes = false;
            }
            for e in field_errors {
                errors.push(self.node_error(
                    &source_description,
                    source,
                    &e.title,
                    e.message,
                    Some(node.datatype.clone()),
                    Some(node.id),
                    nodegroup.id,
                ));
            }
            value.insert(node.id, staged);
        }

        let row = StagingRow {
            load_id: self.load_id,
            resource_id: resource.resource_id,
            tile_id: Uuid::new_v4(),
            parent_tile_id: None,
            nodegroup_id: nodegroup.id,
            nodegroup_depth: nodegroup.depth,
            value,
            sortorder,
            operation: StagingOperation::Insert,
            passes_validation: passes,
            source_description,
            error_message: None,
        };
        Ok((row, errors))
    }

    #[allow(clippy::too_many_arguments)]
    fn node_error(
        &self,
        source_description: &str,
        value: &JsonValue,
        error: &str,
        message: String,
        datatype: Option<String>,
        node_id: Option<Uuid>,
        nodegroup_id: Uuid,
    ) -> LoadError {
        LoadError {
            kind: LoadErrorKind::Node,
            load_id: self.load_id,
            value: Some(match value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            }),
            source: source_description.to_string(),
            error: error.to_string(),
            message,
            datatype,
            node_id,
            nodegroup_id: Some(nodegroup_id),
        }
    }
}

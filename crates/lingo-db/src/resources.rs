//! Committed resources and tiles.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use lingo_core::graph_model::nodes::{
    CONCEPT_NAME_CONTENT, CONCEPT_NAME_LANGUAGE, CONCEPT_NAME_NODEGROUP, CONCEPT_NAME_TYPE,
    PART_OF_SCHEME, SCHEME_NAME_CONTENT, SCHEME_NAME_LANGUAGE, SCHEME_NAME_NODEGROUP,
    SCHEME_NAME_TYPE,
};
use lingo_core::graph_model::{CONCEPTS_GRAPH_ID, SCHEMES_GRAPH_ID};
use lingo_core::lookups::reference_label;
use lingo_core::{
    Error, ExportResource, LabelRecord, LifecycleState, MigrationContext, ResourceInstance,
    ResourceKind, ResourceRepository, Result, Tile,
};

fn kind_of(graph_id: Uuid) -> Result<ResourceKind> {
    match graph_id {
        id if id == SCHEMES_GRAPH_ID => Ok(ResourceKind::Scheme),
        id if id == CONCEPTS_GRAPH_ID => Ok(ResourceKind::Concept),
        other => Err(Error::Internal(format!("Unknown graph {}", other))),
    }
}

fn row_to_resource(row: sqlx::postgres::PgRow) -> Result<ResourceInstance> {
    let graph_id: Uuid = row.get("graphid");
    let state: String = row.get("lifecycle_state");
    Ok(ResourceInstance {
        id: row.get("resourceinstanceid"),
        graph_id,
        kind: kind_of(graph_id)?,
        name: row.get("name"),
        lifecycle_state: state.parse().map_err(Error::Internal)?,
        legacy_id: row.get("legacyid"),
    })
}

fn row_to_tile(row: sqlx::postgres::PgRow) -> Result<Tile> {
    let data: JsonValue = row.get("tiledata");
    Ok(Tile {
        tile_id: row.get("tileid"),
        resource_id: row.get("resourceinstanceid"),
        nodegroup_id: row.get("nodegroupid"),
        parent_tile_id: row.get("parenttileid"),
        sortorder: row.get("sortorder"),
        data: serde_json::from_value::<BTreeMap<Uuid, JsonValue>>(data)?,
    })
}

/// Label records of the name tiles in `tiles`.
///
/// The language is the stored language name; callers that rank by
/// language map it to a code.
pub fn labels_from_tiles(tiles: &[Tile]) -> Vec<LabelRecord> {
    tiles
        .iter()
        .filter_map(|tile| {
            let (content, language, kind) = match tile.nodegroup_id {
                id if id == CONCEPT_NAME_NODEGROUP => {
                    (CONCEPT_NAME_CONTENT, CONCEPT_NAME_LANGUAGE, CONCEPT_NAME_TYPE)
                }
                id if id == SCHEME_NAME_NODEGROUP => {
                    (SCHEME_NAME_CONTENT, SCHEME_NAME_LANGUAGE, SCHEME_NAME_TYPE)
                }
                _ => return None,
            };
            let value = tile.data.get(&content).and_then(|v| v.as_str())?;
            let valuetype = tile
                .data
                .get(&kind)
                .and_then(reference_label)
                .unwrap_or_else(|| "prefLabel".to_string());
            let mut record = LabelRecord::new(tile.resource_id, value, valuetype);
            if let Some(language) = tile.data.get(&language).and_then(reference_label) {
                record = record.with_language(language);
            }
            Some(record)
        })
        .collect()
}

/// PostgreSQL store for committed resources.
#[derive(Clone)]
pub struct PgResourceRepository {
    pool: PgPool,
}

impl PgResourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every committed scheme, ordered by name.
    pub async fn schemes(&self) -> Result<Vec<ResourceInstance>> {
        let rows = sqlx::query(
            "SELECT resourceinstanceid, graphid, name, lifecycle_state, legacyid
             FROM resource_instances WHERE graphid = $1
             ORDER BY name NULLS LAST, resourceinstanceid",
        )
        .bind(SCHEMES_GRAPH_ID)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.into_iter().map(row_to_resource).collect()
    }

    /// Record display names and legacy ids after a load.
    pub async fn annotate(&self, resources: &[(Uuid, Option<String>, Option<String>)]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for (id, name, legacy_id) in resources {
            sqlx::query(
                "UPDATE resource_instances
                 SET name = COALESCE($2, name), legacyid = COALESCE($3, legacyid)
                 WHERE resourceinstanceid = $1",
            )
            .bind(id)
            .bind(name)
            .bind(legacy_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    /// The scheme a concept belongs to.
    pub async fn scheme_of(&self, concept_id: Uuid) -> Result<Option<Uuid>> {
        let tiles = self.tiles_for(&[concept_id]).await?;
        let part_of = tiles
            .iter()
            .filter(|t| t.nodegroup_id == PART_OF_SCHEME)
            .filter_map(|t| t.data.get(&PART_OF_SCHEME))
            .flat_map(lingo_core::mapper::referenced_resources)
            .next();
        Ok(part_of)
    }

    /// Count resources in `state` among `ids`.
    pub async fn count_in_state(&self, ids: &[Uuid], state: LifecycleState) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM resource_instances
             WHERE resourceinstanceid = ANY($1) AND lifecycle_state = $2",
        )
        .bind(ids)
        .bind(state.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }

    /// Every committed tile of the given nodegroups.
    pub async fn tiles_in_nodegroups(&self, nodegroup_ids: &[Uuid]) -> Result<Vec<Tile>> {
        let rows = sqlx::query(
            "SELECT tileid, resourceinstanceid, nodegroupid, parenttileid, sortorder, tiledata
             FROM tiles WHERE nodegroupid = ANY($1)
             ORDER BY resourceinstanceid, nodegroupid, sortorder, tileid",
        )
        .bind(nodegroup_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.into_iter().map(row_to_tile).collect()
    }

    /// The scheme and all of its concepts, re-keyed by alias for export.
    pub async fn export_resources(
        &self,
        scheme_id: Uuid,
        ctx: &MigrationContext,
    ) -> Result<Vec<ExportResource>> {
        let scheme = self
            .get(scheme_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Scheme {} not found", scheme_id)))?;
        if scheme.kind != ResourceKind::Scheme {
            return Err(Error::InvalidInput(format!(
                "Resource {} is not a scheme",
                scheme_id
            )));
        }

        let mut ids = vec![scheme_id];
        ids.extend(self.concepts_in_scheme(scheme_id).await?);
        let tiles = self.tiles_for(&ids).await?;

        let resources: Vec<ExportResource> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let kind = if i == 0 {
                    ResourceKind::Scheme
                } else {
                    ResourceKind::Concept
                };
                ExportResource::from_tiles(*id, ctx.graph(kind), &tiles)
            })
            .collect();

        debug!(
            subsystem = "database",
            component = "resources",
            op = "export_resources",
            scheme_id = %scheme_id,
            resource_count = resources.len(),
            tile_count = tiles.len(),
            "Loaded scheme for export"
        );
        Ok(resources)
    }
}

#[async_trait]
impl ResourceRepository for PgResourceRepository {
    async fn get(&self, id: Uuid) -> Result<Option<ResourceInstance>> {
        let row = sqlx::query(
            "SELECT resourceinstanceid, graphid, name, lifecycle_state, legacyid
             FROM resource_instances WHERE resourceinstanceid = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.map(row_to_resource).transpose()
    }

    async fn tiles_for(&self, resource_ids: &[Uuid]) -> Result<Vec<Tile>> {
        let rows = sqlx::query(
            "SELECT tileid, resourceinstanceid, nodegroupid, parenttileid, sortorder, tiledata
             FROM tiles WHERE resourceinstanceid = ANY($1)
             ORDER BY resourceinstanceid, nodegroupid, sortorder, tileid",
        )
        .bind(resource_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.into_iter().map(row_to_tile).collect()
    }

    async fn concepts_in_scheme(&self, scheme_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT t.resourceinstanceid
             FROM tiles t
             WHERE t.nodegroupid = $1
               AND t.tiledata -> $2 @> jsonb_build_array(jsonb_build_object('resourceId', $3::text))
             ORDER BY t.resourceinstanceid",
        )
        .bind(PART_OF_SCHEME)
        .bind(PART_OF_SCHEME.to_string())
        .bind(scheme_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(ids)
    }

    async fn concept_labels(&self, scheme_id: Option<Uuid>) -> Result<Vec<LabelRecord>> {
        let rows = match scheme_id {
            Some(scheme_id) => {
                let ids = self.concepts_in_scheme(scheme_id).await?;
                sqlx::query(
                    "SELECT tileid, resourceinstanceid, nodegroupid, parenttileid, sortorder, tiledata
                     FROM tiles WHERE nodegroupid = $1 AND resourceinstanceid = ANY($2)
                     ORDER BY resourceinstanceid, sortorder",
                )
                .bind(CONCEPT_NAME_NODEGROUP)
                .bind(&ids)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT tileid, resourceinstanceid, nodegroupid, parenttileid, sortorder, tiledata
                     FROM tiles WHERE nodegroupid = $1
                     ORDER BY resourceinstanceid, sortorder",
                )
                .bind(CONCEPT_NAME_NODEGROUP)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(Error::Database)?;

        let tiles = rows
            .into_iter()
            .map(row_to_tile)
            .collect::<Result<Vec<_>>>()?;
        Ok(labels_from_tiles(&tiles))
    }
}

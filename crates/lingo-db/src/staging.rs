//! Staging table repository: bulk insert, validation and promotion.
//!
//! A load writes its rows to `load_staging` and its validation failures to
//! `load_errors`. Nothing reaches `resource_instances`/`tiles` until
//! [`StagingRepository::promote`] runs, which refuses loads with failing
//! rows and does all of its writes in one transaction.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use lingo_core::{
    Error, LoadError, LoadErrorKind, LoadStatus, OverwriteOption, PromotionSummary, Result,
    StagingBatch, StagingRepository, StagingRow,
};

/// Rows per bulk insert statement.
const INSERT_CHUNK_SIZE: usize = 1000;

/// PostgreSQL implementation of StagingRepository.
#[derive(Clone)]
pub struct PgStagingRepository {
    pool: PgPool,
}

impl PgStagingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of staged rows of a load.
    pub async fn row_count(&self, load_id: Uuid) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM load_staging WHERE loadid = $1")
                .bind(load_id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count)
    }

    async fn insert_rows(tx: &mut Transaction<'_, Postgres>, rows: &[StagingRow]) -> Result<()> {
        for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
            let mut load_ids = Vec::with_capacity(chunk.len());
            let mut resource_ids = Vec::with_capacity(chunk.len());
            let mut tile_ids = Vec::with_capacity(chunk.len());
            let mut parent_tile_ids: Vec<Option<Uuid>> = Vec::with_capacity(chunk.len());
            let mut nodegroup_ids = Vec::with_capacity(chunk.len());
            let mut depths = Vec::with_capacity(chunk.len());
            let mut values: Vec<JsonValue> = Vec::with_capacity(chunk.len());
            let mut sortorders = Vec::with_capacity(chunk.len());
            let mut operations = Vec::with_capacity(chunk.len());
            let mut passes = Vec::with_capacity(chunk.len());
            let mut sources = Vec::with_capacity(chunk.len());
            let mut messages: Vec<Option<String>> = Vec::with_capacity(chunk.len());

            for row in chunk {
                load_ids.push(row.load_id);
                resource_ids.push(row.resource_id);
                tile_ids.push(row.tile_id);
                parent_tile_ids.push(row.parent_tile_id);
                nodegroup_ids.push(row.nodegroup_id);
                depths.push(row.nodegroup_depth);
                values.push(serde_json::to_value(&row.value)?);
                sortorders.push(row.sortorder);
                operations.push(row.operation.as_str().to_string());
                passes.push(row.passes_validation);
                sources.push(row.source_description.clone());
                messages.push(row.error_message.clone());
            }

            sqlx::query(
                "INSERT INTO load_staging (
                     loadid, resourceid, tileid, parenttileid, nodegroupid, nodegroup_depth,
                     value, sortorder, operation, passes_validation, source_description,
                     error_message
                 )
                 SELECT * FROM UNNEST(
                     $1::uuid[], $2::uuid[], $3::uuid[], $4::uuid[], $5::uuid[], $6::int4[],
                     $7::jsonb[], $8::int4[], $9::text[], $10::bool[], $11::text[], $12::text[]
                 )",
            )
            .bind(&load_ids)
            .bind(&resource_ids)
            .bind(&tile_ids)
            .bind(&parent_tile_ids)
            .bind(&nodegroup_ids)
            .bind(&depths)
            .bind(&values)
            .bind(&sortorders)
            .bind(&operations)
            .bind(&passes)
            .bind(&sources)
            .bind(&messages)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }

    async fn insert_errors(
        tx: &mut Transaction<'_, Postgres>,
        errors: &[LoadError],
    ) -> Result<()> {
        for chunk in errors.chunks(INSERT_CHUNK_SIZE) {
            let load_ids: Vec<Uuid> = chunk.iter().map(|e| e.load_id).collect();
            let kinds: Vec<String> = chunk.iter().map(|e| e.kind.as_str().to_string()).collect();
            let values: Vec<Option<String>> = chunk.iter().map(|e| e.value.clone()).collect();
            let sources: Vec<String> = chunk.iter().map(|e| e.source.clone()).collect();
            let titles: Vec<String> = chunk.iter().map(|e| e.error.clone()).collect();
            let messages: Vec<String> = chunk.iter().map(|e| e.message.clone()).collect();
            let datatypes: Vec<Option<String>> = chunk.iter().map(|e| e.datatype.clone()).collect();
            let node_ids: Vec<Option<Uuid>> = chunk.iter().map(|e| e.node_id).collect();
            let nodegroup_ids: Vec<Option<Uuid>> = chunk.iter().map(|e| e.nodegroup_id).collect();

            sqlx::query(
                "INSERT INTO load_errors (
                     loadid, type, value, source, error, message, datatype, nodeid, nodegroupid
                 )
                 SELECT * FROM UNNEST(
                     $1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[],
                     $7::text[], $8::uuid[], $9::uuid[]
                 )",
            )
            .bind(&load_ids)
            .bind(&kinds)
            .bind(&values)
            .bind(&sources)
            .bind(&titles)
            .bind(&messages)
            .bind(&datatypes)
            .bind(&node_ids)
            .bind(&nodegroup_ids)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }
}

fn row_to_error(row: sqlx::postgres::PgRow) -> LoadError {
    let kind: String = row.get("type");
    LoadError {
        kind: if kind == "tile" {
            LoadErrorKind::Tile
        } else {
            LoadErrorKind::Node
        },
        load_id: row.get("loadid"),
        value: row.get("value"),
        source: row.get("source"),
        error: row.get("error"),
        message: row.get("message"),
        datatype: row.get("datatype"),
        node_id: row.get("nodeid"),
        nodegroup_id: row.get("nodegroupid"),
    }
}

#[async_trait]
impl StagingRepository for PgStagingRepository {
    async fn insert_batch(&self, batch: &StagingBatch) -> Result<()> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        Self::insert_rows(&mut tx, &batch.rows).await?;
        Self::insert_errors(&mut tx, &batch.errors).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "staging",
            op = "insert_batch",
            load_id = %batch.load_id,
            row_count = batch.rows.len(),
            error_count = batch.errors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Staged batch"
        );
        Ok(())
    }

    async fn check_cardinality(&self, load_id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let failed = sqlx::query(
            "WITH violations AS (
                 SELECT s.resourceid, s.nodegroupid, COUNT(*) AS staged
                 FROM load_staging s
                 JOIN node_groups ng ON ng.nodegroupid = s.nodegroupid
                 WHERE s.loadid = $1 AND ng.cardinality = '1'
                 GROUP BY s.resourceid, s.nodegroupid
                 HAVING COUNT(*) > 1
             )
             UPDATE load_staging s
             SET passes_validation = false,
                 error_message = format(
                     'Nodegroup %s allows one tile per resource, %s staged for %s',
                     v.nodegroupid, v.staged, v.resourceid
                 )
             FROM violations v
             WHERE s.loadid = $1
               AND s.resourceid = v.resourceid
               AND s.nodegroupid = v.nodegroupid
               AND s.passes_validation
             RETURNING s.nodegroupid, s.source_description, s.error_message",
        )
        .bind(load_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let errors: Vec<LoadError> = failed
            .iter()
            .map(|row| LoadError {
                kind: LoadErrorKind::Tile,
                load_id,
                value: None,
                source: row
                    .get::<Option<String>, _>("source_description")
                    .unwrap_or_default(),
                error: "Cardinality violation".to_string(),
                message: row
                    .get::<Option<String>, _>("error_message")
                    .unwrap_or_default(),
                datatype: None,
                node_id: None,
                nodegroup_id: Some(row.get("nodegroupid")),
            })
            .collect();
        Self::insert_errors(&mut tx, &errors).await?;
        tx.commit().await.map_err(Error::Database)?;

        if !errors.is_empty() {
            warn!(
                subsystem = "database",
                component = "staging",
                op = "check_cardinality",
                load_id = %load_id,
                failed_count = errors.len(),
                "Staged rows violate nodegroup cardinality"
            );
        }
        Ok(errors.len() as u64)
    }

    async fn failed_count(&self, load_id: Uuid) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM load_staging WHERE loadid = $1 AND NOT passes_validation",
        )
        .bind(load_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }

    async fn errors(&self, load_id: Uuid) -> Result<Vec<LoadError>> {
        let rows = sqlx::query(
            "SELECT loadid, type, value, source, error, message, datatype, nodeid, nodegroupid
             FROM load_errors WHERE loadid = $1 ORDER BY id",
        )
        .bind(load_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(row_to_error).collect())
    }

    async fn promote(&self, load_id: Uuid, overwrite: OverwriteOption) -> Result<PromotionSummary> {
        let start = Instant::now();
        let failed = self.failed_count(load_id).await?;
        if failed > 0 {
            return Err(Error::InvalidInput(format!(
                "Load {} has {} rows failing validation and cannot be promoted",
                load_id, failed
            )));
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let existing: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT s.resourceid
             FROM load_staging s
             JOIN resource_instances ri ON ri.resourceinstanceid = s.resourceid
             WHERE s.loadid = $1",
        )
        .bind(load_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let resources_created = sqlx::query(
            "INSERT INTO resource_instances (resourceinstanceid, graphid, loadid)
             SELECT DISTINCT ON (s.resourceid) s.resourceid, ng.graphid, s.loadid
             FROM load_staging s
             JOIN node_groups ng ON ng.nodegroupid = s.nodegroupid
             WHERE s.loadid = $1
             ORDER BY s.resourceid
             ON CONFLICT (resourceinstanceid) DO NOTHING",
        )
        .bind(load_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        let existing_count = existing.len();
        let mut summary = PromotionSummary {
            resources_created,
            ..PromotionSummary::default()
        };
        let skipped: Vec<Uuid> = match overwrite {
            OverwriteOption::Overwrite => {
                summary.tiles_replaced =
                    sqlx::query("DELETE FROM tiles WHERE resourceinstanceid = ANY($1)")
                        .bind(&existing)
                        .execute(&mut *tx)
                        .await
                        .map_err(Error::Database)?
                        .rows_affected();
                Vec::new()
            }
            OverwriteOption::Ignore => {
                summary.resources_skipped = existing_count as u64;
                existing
            }
        };

        summary.tiles_written = sqlx::query(
            "INSERT INTO tiles (
                 tileid, resourceinstanceid, nodegroupid, parenttileid, sortorder, tiledata, loadid
             )
             SELECT s.tileid, s.resourceid, s.nodegroupid, s.parenttileid, s.sortorder,
                    COALESCE(
                        (SELECT jsonb_object_agg(e.key, e.value -> 'value')
                         FROM jsonb_each(s.value) e),
                        '{}'::jsonb
                    ),
                    s.loadid
             FROM load_staging s
             WHERE s.loadid = $1
               AND s.operation = 'insert'
               AND NOT (s.resourceid = ANY($2))
             ORDER BY s.nodegroup_depth, s.resourceid, s.nodegroupid, s.sortorder",
        )
        .bind(load_id)
        .bind(&skipped)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "staging",
            op = "promote",
            load_id = %load_id,
            resources_created = summary.resources_created,
            resources_existing = existing_count,
            tiles_written = summary.tiles_written,
            tiles_replaced = summary.tiles_replaced,
            duration_ms = start.elapsed().as_millis() as u64,
            "Promoted staged load"
        );
        Ok(summary)
    }

    async fn reverse_load(&self, load_id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let tiles = sqlx::query("DELETE FROM tiles WHERE loadid = $1")
            .bind(load_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        let resources = sqlx::query("DELETE FROM resource_instances WHERE loadid = $1")
            .bind(load_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        let updated = sqlx::query(
            "UPDATE load_event SET status = $2, load_end_time = NOW() WHERE loadid = $1",
        )
        .bind(load_id)
        .bind(LoadStatus::Reversed.as_str())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        if updated == 0 {
            return Err(Error::NotFound(format!("Load event {} not found", load_id)));
        }
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "staging",
            op = "reverse_load",
            load_id = %load_id,
            tiles_removed = tiles,
            resources_removed = resources,
            "Reversed load"
        );
        Ok(tiles)
    }
}

//! Scheme lifecycle transitions applied to the database.
//!
//! Promotion to `active` mints identifiers for draft concepts and, once the
//! scheme itself has a minted identifier, brings every concept's `uri` tile
//! in line with the scheme's URI template. The
//! decisions come from `lingo_core::lifecycle`; this module gathers state,
//! locks the rows it changes and writes the result in one transaction.
//! Running the same transition twice writes nothing the second time.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use lingo_core::defaults::IDENTIFIER_SOURCE;
use lingo_core::graph_model::nodes::{
    CONCEPT_IDENTIFIER_CONTENT, CONCEPT_IDENTIFIER_NODEGROUP, CONCEPT_IDENTIFIER_TYPE,
    CONCEPT_URI_CONTENT, CONCEPT_URI_NODEGROUP, SCHEME_URI_CONTENT, SCHEME_URI_NODEGROUP,
};
use lingo_core::lifecycle::{
    plan_identifier_assignments, plan_uri_updates, render_scheme_uri, url_of, url_value,
    ConceptUriState, LifecycleTransition, UriAction,
};
use lingo_core::lookups::lists;
use lingo_core::{
    Error, IdentifierAllocator, LifecycleState, LingoConfig, ListItem, ResourceIdentifier,
    ResourceKind, ResourceRepository, Result,
};

use crate::identifiers::insert_identifier_tx;
use crate::Database;

/// Writes performed by one synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSummary {
    pub identifiers_assigned: usize,
    pub uri_tiles_created: usize,
    pub uri_tiles_updated: usize,
    pub resources_updated: u64,
}

impl LifecycleSummary {
    pub fn tile_writes(&self) -> usize {
        self.identifiers_assigned + self.uri_tiles_created + self.uri_tiles_updated
    }
}

pub struct LifecycleSynchronizer {
    db: Database,
    config: LingoConfig,
}

impl LifecycleSynchronizer {
    pub fn new(db: Database, config: LingoConfig) -> Self {
        Self { db, config }
    }

    /// Apply `transition` to a scheme and its non-retired concepts.
    pub async fn sync(
        &self,
        scheme_id: Uuid,
        transition: LifecycleTransition,
    ) -> Result<LifecycleSummary> {
        let start = Instant::now();
        let scheme = self
            .db
            .resources
            .get(scheme_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Scheme {} not found", scheme_id)))?;
        if scheme.kind != ResourceKind::Scheme {
            return Err(Error::InvalidInput(format!(
                "{} is a concept; lifecycle transitions apply to schemes",
                scheme_id
            )));
        }
        if scheme.lifecycle_state != transition.from {
            debug!(
                subsystem = "database",
                component = "lifecycle",
                scheme_id = %scheme_id,
                stored = scheme.lifecycle_state.as_str(),
                from = transition.from.as_str(),
                "Stored scheme state differs from transition source"
            );
        }

        let concept_ids = self.db.resources.concepts_in_scheme(scheme_id).await?;
        let mut summary = LifecycleSummary::default();

        let template = if transition.promotes_to_active() {
            let template = self
                .db
                .identifiers
                .ensure_template(scheme_id, &self.config.default_uri_template())
                .await?;
            self.db.identifiers.ensure_counter(scheme_id).await?;
            Some(template.url_template)
        } else {
            None
        };

        let mut tx = self.db.pool.begin().await.map_err(Error::Database)?;

        if let Some(template) = template {
            let drafts = lock_unidentified_drafts(&mut tx, &concept_ids).await?;
            if !drafts.is_empty() {
                let first = self
                    .db
                    .identifiers
                    .allocate(scheme_id, drafts.len() as i64)
                    .await?;
                for assignment in plan_identifier_assignments(&drafts, first) {
                    insert_identifier_tx(
                        &mut tx,
                        &ResourceIdentifier {
                            resource_id: assignment.concept_id,
                            identifier: assignment.identifier.clone(),
                            source: IDENTIFIER_SOURCE.to_string(),
                            identifier_type: Some("identifier".to_string()),
                        },
                    )
                    .await?;
                    insert_tile(
                        &mut tx,
                        assignment.concept_id,
                        CONCEPT_IDENTIFIER_NODEGROUP,
                        identifier_data(&assignment.identifier),
                    )
                    .await?;
                    summary.identifiers_assigned += 1;
                }
            }

            match scheme_identifier(&mut tx, scheme_id).await? {
                Some(scheme_identifier) => {
                    sync_uris(
                        &mut tx,
                        scheme_id,
                        &concept_ids,
                        &template,
                        &scheme_identifier,
                        &mut summary,
                    )
                    .await?;
                }
                None => debug!(
                    subsystem = "database",
                    component = "lifecycle",
                    scheme_id = %scheme_id,
                    "Scheme has no identifier; URIs left unchanged"
                ),
            }
        }

        summary.resources_updated =
            propagate_state(&mut tx, scheme_id, &concept_ids, transition.to).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "lifecycle",
            op = "sync",
            scheme_id = %scheme_id,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            identifiers_assigned = summary.identifiers_assigned,
            uri_tiles_created = summary.uri_tiles_created,
            uri_tiles_updated = summary.uri_tiles_updated,
            resources_updated = summary.resources_updated,
            duration_ms = start.elapsed().as_millis() as u64,
            "Lifecycle transition applied"
        );
        Ok(summary)
    }
}

/// Bring concept and scheme `uri` tiles in line with the template.
async fn sync_uris(
    tx: &mut Transaction<'_, Postgres>,
    scheme_id: Uuid,
    concept_ids: &[Uuid],
    template: &str,
    scheme_identifier: &str,
    summary: &mut LifecycleSummary,
) -> Result<()> {
    let states = uri_states(tx, concept_ids).await?;
    for action in plan_uri_updates(template, scheme_identifier, &states) {
        match action {
            UriAction::Create { concept_id, uri } => {
                insert_tile(
                    tx,
                    concept_id,
                    CONCEPT_URI_NODEGROUP,
                    uri_data(CONCEPT_URI_CONTENT, &uri),
                )
                .await?;
                summary.uri_tiles_created += 1;
            }
            UriAction::Update { tile_id, uri, .. } => {
                update_tile(tx, tile_id, uri_data(CONCEPT_URI_CONTENT, &uri)).await?;
                summary.uri_tiles_updated += 1;
            }
        }
    }

    if let Some(uri) = render_scheme_uri(template, scheme_identifier) {
        match scheme_uri_tile(tx, scheme_id).await? {
            None => {
                insert_tile(
                    tx,
                    scheme_id,
                    SCHEME_URI_NODEGROUP,
                    uri_data(SCHEME_URI_CONTENT, &uri),
                )
                .await?;
                summary.uri_tiles_created += 1;
            }
            Some((_, Some(existing))) if existing == uri => {}
            Some((tile_id, _)) => {
                update_tile(tx, tile_id, uri_data(SCHEME_URI_CONTENT, &uri)).await?;
                summary.uri_tiles_updated += 1;
            }
        }
    }
    Ok(())
}

fn identifier_data(identifier: &str) -> JsonValue {
    let mut data = serde_json::Map::new();
    data.insert(
        CONCEPT_IDENTIFIER_CONTENT.to_string(),
        JsonValue::String(identifier.to_string()),
    );
    data.insert(
        CONCEPT_IDENTIFIER_TYPE.to_string(),
        ListItem::with_label(lists::IDENTIFIER_TYPES, "identifier").to_reference(),
    );
    JsonValue::Object(data)
}

fn uri_data(node_id: Uuid, uri: &str) -> JsonValue {
    let mut data = serde_json::Map::new();
    data.insert(node_id.to_string(), url_value(uri));
    JsonValue::Object(data)
}

/// Draft concepts without a minted identifier, locked, in id order.
async fn lock_unidentified_drafts(
    tx: &mut Transaction<'_, Postgres>,
    concept_ids: &[Uuid],
) -> Result<Vec<Uuid>> {
    sqlx::query_scalar(
        "SELECT ri.resourceinstanceid FROM resource_instances ri
         WHERE ri.resourceinstanceid = ANY($1)
           AND ri.lifecycle_state = 'draft'
           AND NOT EXISTS (
               SELECT 1 FROM resource_identifiers x
               WHERE x.resourceid = ri.resourceinstanceid AND x.source = $2
           )
         ORDER BY ri.resourceinstanceid
         FOR UPDATE",
    )
    .bind(concept_ids)
    .bind(IDENTIFIER_SOURCE)
    .fetch_all(&mut **tx)
    .await
    .map_err(Error::Database)
}

/// The scheme's minted identifier, if it has one.
async fn scheme_identifier(
    tx: &mut Transaction<'_, Postgres>,
    scheme_id: Uuid,
) -> Result<Option<String>> {
    let identifier: Option<String> = sqlx::query_scalar(
        "SELECT identifier FROM resource_identifiers
         WHERE resourceid = $1 AND source = $2
         ORDER BY identifier
         LIMIT 1",
    )
    .bind(scheme_id)
    .bind(IDENTIFIER_SOURCE)
    .fetch_optional(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(identifier.filter(|i| !i.is_empty()))
}

/// Identifier and `uri` tile of every non-retired concept.
async fn uri_states(
    tx: &mut Transaction<'_, Postgres>,
    concept_ids: &[Uuid],
) -> Result<Vec<ConceptUriState>> {
    let active: Vec<Uuid> = sqlx::query_scalar(
        "SELECT resourceinstanceid FROM resource_instances
         WHERE resourceinstanceid = ANY($1) AND lifecycle_state <> 'retired'
         ORDER BY resourceinstanceid",
    )
    .bind(concept_ids)
    .fetch_all(&mut **tx)
    .await
    .map_err(Error::Database)?;

    let identifiers: HashMap<Uuid, String> = sqlx::query(
        "SELECT DISTINCT ON (resourceid) resourceid, identifier FROM resource_identifiers
         WHERE resourceid = ANY($1) AND source = $2
         ORDER BY resourceid, identifier",
    )
    .bind(&active)
    .bind(IDENTIFIER_SOURCE)
    .fetch_all(&mut **tx)
    .await
    .map_err(Error::Database)?
    .into_iter()
    .map(|r| (r.get("resourceid"), r.get("identifier")))
    .collect();

    let rows = sqlx::query(
        "SELECT resourceinstanceid, tileid, tiledata FROM tiles
         WHERE resourceinstanceid = ANY($1) AND nodegroupid = $2
         ORDER BY resourceinstanceid, sortorder, tileid
         FOR UPDATE",
    )
    .bind(&active)
    .bind(CONCEPT_URI_NODEGROUP)
    .fetch_all(&mut **tx)
    .await
    .map_err(Error::Database)?;

    let mut uri_tiles: HashMap<Uuid, (Uuid, Option<String>)> = HashMap::new();
    for row in rows {
        let data: JsonValue = row.get("tiledata");
        let url = data
            .get(CONCEPT_URI_CONTENT.to_string())
            .and_then(url_of)
            .map(str::to_string);
        uri_tiles
            .entry(row.get("resourceinstanceid"))
            .or_insert((row.get("tileid"), url));
    }

    Ok(active
        .into_iter()
        .map(|concept_id| ConceptUriState {
            concept_id,
            identifier: identifiers.get(&concept_id).cloned(),
            uri_tile: uri_tiles.get(&concept_id).cloned(),
        })
        .collect())
}

async fn scheme_uri_tile(
    tx: &mut Transaction<'_, Postgres>,
    scheme_id: Uuid,
) -> Result<Option<(Uuid, Option<String>)>> {
    let row = sqlx::query(
        "SELECT tileid, tiledata FROM tiles
         WHERE resourceinstanceid = $1 AND nodegroupid = $2
         ORDER BY sortorder, tileid
         LIMIT 1
         FOR UPDATE",
    )
    .bind(scheme_id)
    .bind(SCHEME_URI_NODEGROUP)
    .fetch_optional(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(row.map(|r| {
        let data: JsonValue = r.get("tiledata");
        let url = data
            .get(SCHEME_URI_CONTENT.to_string())
            .and_then(url_of)
            .map(str::to_string);
        (r.get("tileid"), url)
    }))
}

async fn insert_tile(
    tx: &mut Transaction<'_, Postgres>,
    resource_id: Uuid,
    nodegroup_id: Uuid,
    data: JsonValue,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO tiles (tileid, resourceinstanceid, nodegroupid, sortorder, tiledata)
         VALUES ($1, $2, $3, 0, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(resource_id)
    .bind(nodegroup_id)
    .bind(data)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;
    Ok(())
}

async fn update_tile(tx: &mut Transaction<'_, Postgres>, tile_id: Uuid, data: JsonValue) -> Result<()> {
    sqlx::query("UPDATE tiles SET tiledata = tiledata || $2 WHERE tileid = $1")
        .bind(tile_id)
        .bind(data)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
    Ok(())
}

/// Move the scheme and its non-retired concepts to `state`.
async fn propagate_state(
    tx: &mut Transaction<'_, Postgres>,
    scheme_id: Uuid,
    concept_ids: &[Uuid],
    state: LifecycleState,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE resource_instances SET lifecycle_state = $3
         WHERE (resourceinstanceid = $1 OR resourceinstanceid = ANY($2))
           AND lifecycle_state <> 'retired'
           AND lifecycle_state <> $3",
    )
    .bind(scheme_id)
    .bind(concept_ids)
    .bind(state.as_str())
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_data_is_keyed_by_node() {
        let data = uri_data(CONCEPT_URI_CONTENT, "https://x.org/c/1");
        assert_eq!(
            url_of(&data[CONCEPT_URI_CONTENT.to_string()]),
            Some("https://x.org/c/1")
        );
    }

    #[test]
    fn test_identifier_data_carries_type_reference() {
        let data = identifier_data("42");
        assert_eq!(data[CONCEPT_IDENTIFIER_CONTENT.to_string()], "42");
        assert!(data[CONCEPT_IDENTIFIER_TYPE.to_string()].is_array());
    }

    #[test]
    fn test_tile_writes_exclude_state_updates() {
        let summary = LifecycleSummary {
            identifiers_assigned: 2,
            uri_tiles_created: 2,
            uri_tiles_updated: 1,
            resources_updated: 3,
        };
        assert_eq!(summary.tile_writes(), 5);
        assert_eq!(LifecycleSummary::default().tile_writes(), 0);
    }
}

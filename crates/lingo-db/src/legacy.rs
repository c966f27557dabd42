//! Readers for the legacy RDM tables (`concepts`, `values`, `relations`).

use std::collections::BTreeMap;

use sqlx::{PgPool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use lingo_core::{
    Error, LegacyConcept, LegacyNodeType, LegacyRelation, LegacyRelationType, Result, SourceValue,
};

/// Read-only access to a legacy thesaurus.
#[derive(Clone)]
pub struct PgLegacyRepository {
    pool: PgPool,
}

impl PgLegacyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ids of every legacy concept scheme.
    pub async fn scheme_ids(&self) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT conceptid FROM concepts WHERE nodetype = 'ConceptScheme' ORDER BY conceptid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(ids)
    }

    /// The scheme and every concept reachable from it through
    /// `hasTopConcept` and `narrower`, with their values.
    ///
    /// `UNION` (not `UNION ALL`) keeps the walk finite on cyclic data; cycles
    /// themselves are reported later by the hierarchy extractor.
    pub async fn scheme_concepts(&self, scheme_id: Uuid) -> Result<Vec<LegacyConcept>> {
        let rows = sqlx::query(
            r#"WITH RECURSIVE reachable(conceptid) AS (
                   SELECT $1::uuid
                   UNION
                   SELECT r.conceptidto
                   FROM relations r
                   JOIN reachable ON r.conceptidfrom = reachable.conceptid
                   WHERE r.relationtype IN ('hasTopConcept', 'narrower')
               )
               SELECT c.conceptid, c.nodetype, v.valuetype, v.value, v.languageid
               FROM concepts c
               JOIN reachable ON reachable.conceptid = c.conceptid
               LEFT JOIN "values" v ON v.conceptid = c.conceptid
               ORDER BY c.conceptid, v.valuetype, v.value"#,
        )
        .bind(scheme_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut concepts: BTreeMap<Uuid, LegacyConcept> = BTreeMap::new();
        for row in rows {
            let id: Uuid = row.get("conceptid");
            if !concepts.contains_key(&id) {
                let nodetype: String = row.get("nodetype");
                let nodetype: LegacyNodeType = nodetype.parse().map_err(Error::InvalidInput)?;
                concepts.insert(
                    id,
                    LegacyConcept {
                        id,
                        nodetype,
                        values: Vec::new(),
                    },
                );
            }

            let valuetype: Option<String> = row.get("valuetype");
            let value: Option<String> = row.get("value");
            if let (Some(valuetype), Some(value), Some(concept)) =
                (valuetype, value, concepts.get_mut(&id))
            {
                let mut source = SourceValue::new(valuetype, value);
                if let Some(language) = row.get::<Option<String>, _>("languageid") {
                    source = source.with_language(language);
                }
                concept.values.push(source);
            }
        }

        if !concepts.contains_key(&scheme_id) {
            return Err(Error::NotFound(format!("Scheme {} not found", scheme_id)));
        }
        debug!(
            subsystem = "database",
            component = "legacy",
            op = "scheme_concepts",
            scheme_id = %scheme_id,
            concept_count = concepts.len(),
            "Loaded legacy concepts"
        );
        Ok(concepts.into_values().collect())
    }

    /// The whole relation table, restricted to the relation types the
    /// migration understands.
    pub async fn relations(&self) -> Result<Vec<LegacyRelation>> {
        let rows = sqlx::query(
            "SELECT conceptidfrom, conceptidto, relationtype FROM relations
             ORDER BY conceptidfrom, conceptidto",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut relations = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for row in rows {
            let relation_type: String = row.get("relationtype");
            match relation_type.parse::<LegacyRelationType>() {
                Ok(relation_type) => relations.push(LegacyRelation {
                    from: row.get("conceptidfrom"),
                    to: row.get("conceptidto"),
                    relation_type,
                }),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(
                subsystem = "database",
                component = "legacy",
                op = "relations",
                skipped,
                "Ignoring relations of unsupported types"
            );
        }
        Ok(relations)
    }
}

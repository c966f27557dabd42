//! Per-scheme identifier counters, URI templates and minted identifiers.
//!
//! `allocate` is the only place identifier numbers are handed out. It locks
//! the scheme's counter row and commits in its own transaction, so
//! concurrent callers receive disjoint contiguous ranges and a caller that
//! later rolls back simply leaves a gap.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use lingo_core::defaults::COUNTER_START_NUMBER;
use lingo_core::{
    ConceptIdentifierCounter, Error, IdentifierAllocator, ResourceIdentifier, Result,
    SchemeUriTemplate,
};

/// PostgreSQL implementation of IdentifierAllocator.
#[derive(Clone)]
pub struct PgIdentifierAllocator {
    pool: PgPool,
}

impl PgIdentifierAllocator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn counter(&self, scheme_id: Uuid) -> Result<Option<ConceptIdentifierCounter>> {
        let row = sqlx::query(
            "SELECT scheme_id, start_number, next_number
             FROM concept_identifier_counter WHERE scheme_id = $1",
        )
        .bind(scheme_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| ConceptIdentifierCounter {
            scheme_id: r.get("scheme_id"),
            start_number: r.get("start_number"),
            next_number: r.get("next_number"),
        }))
    }

    // =========================================================================
    // URI TEMPLATES
    // =========================================================================

    pub async fn template(&self, scheme_id: Uuid) -> Result<Option<SchemeUriTemplate>> {
        let row = sqlx::query(
            "SELECT scheme_id, url_template FROM scheme_uri_template WHERE scheme_id = $1",
        )
        .bind(scheme_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| SchemeUriTemplate {
            scheme_id: r.get("scheme_id"),
            url_template: r.get("url_template"),
        }))
    }

    /// The scheme's template, created from `default_template` when missing.
    pub async fn ensure_template(
        &self,
        scheme_id: Uuid,
        default_template: &str,
    ) -> Result<SchemeUriTemplate> {
        let url_template: String = sqlx::query_scalar(
            "WITH inserted AS (
                 INSERT INTO scheme_uri_template (scheme_id, url_template)
                 VALUES ($1, $2)
                 ON CONFLICT (scheme_id) DO NOTHING
                 RETURNING url_template
             )
             SELECT url_template FROM inserted
             UNION ALL
             SELECT url_template FROM scheme_uri_template WHERE scheme_id = $1
             LIMIT 1",
        )
        .bind(scheme_id)
        .bind(default_template)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(SchemeUriTemplate {
            scheme_id,
            url_template,
        })
    }

    pub async fn set_template(&self, scheme_id: Uuid, url_template: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO scheme_uri_template (scheme_id, url_template) VALUES ($1, $2)
             ON CONFLICT (scheme_id) DO UPDATE SET url_template = EXCLUDED.url_template",
        )
        .bind(scheme_id)
        .bind(url_template)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    // =========================================================================
    // MINTED IDENTIFIERS
    // =========================================================================

    pub async fn identifiers_for(&self, resource_id: Uuid) -> Result<Vec<ResourceIdentifier>> {
        let rows = sqlx::query(
            "SELECT resourceid, identifier, source, identifier_type
             FROM resource_identifiers WHERE resourceid = $1 ORDER BY source, identifier",
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| ResourceIdentifier {
                resource_id: r.get("resourceid"),
                identifier: r.get("identifier"),
                source: r.get("source"),
                identifier_type: r.get("identifier_type"),
            })
            .collect())
    }

    /// Record an identifier for a resource; recording it twice is a no-op.
    pub async fn add_identifier(&self, identifier: &ResourceIdentifier) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        insert_identifier_tx(&mut tx, identifier).await?;
        tx.commit().await.map_err(Error::Database)?;
        debug!(
            subsystem = "database",
            component = "identifiers",
            resource_id = %identifier.resource_id,
            source = %identifier.source,
            "Identifier recorded"
        );
        Ok(())
    }
}

/// Record a minted identifier inside the caller's transaction.
pub(crate) async fn insert_identifier_tx(
    tx: &mut Transaction<'_, Postgres>,
    identifier: &ResourceIdentifier,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO resource_identifiers (resourceid, identifier, source, identifier_type)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (resourceid, source, identifier) DO NOTHING",
    )
    .bind(identifier.resource_id)
    .bind(&identifier.identifier)
    .bind(&identifier.source)
    .bind(&identifier.identifier_type)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;
    Ok(())
}

async fn insert_counter_if_missing(
    tx: &mut Transaction<'_, Postgres>,
    scheme_id: Uuid,
    start: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO concept_identifier_counter (scheme_id, start_number, next_number)
         VALUES ($1, $2, $2)
         ON CONFLICT (scheme_id) DO NOTHING",
    )
    .bind(scheme_id)
    .bind(start)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;
    Ok(())
}

async fn lock_counter(
    tx: &mut Transaction<'_, Postgres>,
    scheme_id: Uuid,
) -> Result<ConceptIdentifierCounter> {
    let (start_number, next_number): (i64, i64) = sqlx::query_as(
        "SELECT start_number, next_number FROM concept_identifier_counter
         WHERE scheme_id = $1 FOR UPDATE",
    )
    .bind(scheme_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(ConceptIdentifierCounter {
        scheme_id,
        start_number,
        next_number,
    })
}

#[async_trait]
impl IdentifierAllocator for PgIdentifierAllocator {
    async fn allocate(&self, scheme_id: Uuid, count: i64) -> Result<i64> {
        if count < 1 {
            return Err(Error::InvalidInput(format!(
                "Identifier count must be at least 1, got {}",
                count
            )));
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        insert_counter_if_missing(&mut tx, scheme_id, COUNTER_START_NUMBER).await?;
        let counter = lock_counter(&mut tx, scheme_id).await?;

        sqlx::query(
            "UPDATE concept_identifier_counter SET next_number = next_number + $2
             WHERE scheme_id = $1",
        )
        .bind(scheme_id)
        .bind(count)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "allocator",
            op = "allocate",
            scheme_id = %scheme_id,
            first = counter.next_number,
            count,
            "Allocated identifier range"
        );
        Ok(counter.next_number)
    }

    async fn ensure_counter(&self, scheme_id: Uuid) -> Result<ConceptIdentifierCounter> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        insert_counter_if_missing(&mut tx, scheme_id, COUNTER_START_NUMBER).await?;
        let counter = lock_counter(&mut tx, scheme_id).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(counter)
    }

    async fn set_counter_start(
        &self,
        scheme_id: Uuid,
        start: i64,
    ) -> Result<ConceptIdentifierCounter> {
        if start < 1 {
            return Err(Error::InvalidInput(format!(
                "Counter start number must be at least 1, got {}",
                start
            )));
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        insert_counter_if_missing(&mut tx, scheme_id, start).await?;
        let counter = lock_counter(&mut tx, scheme_id).await?;
        if !counter.is_unused() {
            return Err(Error::InvalidInput(format!(
                "The identifier counter of scheme {} has already been used; \
                 its start number can no longer change",
                scheme_id
            )));
        }

        sqlx::query(
            "UPDATE concept_identifier_counter SET start_number = $2, next_number = $2
             WHERE scheme_id = $1",
        )
        .bind(scheme_id)
        .bind(start)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "allocator",
            op = "set_counter_start",
            scheme_id = %scheme_id,
            start,
            "Identifier counter re-based"
        );
        Ok(ConceptIdentifierCounter {
            scheme_id,
            start_number: start,
            next_number: start,
        })
    }
}

//! Load event repository implementation.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use lingo_core::{Error, LoadEvent, LoadEventRepository, LoadStatus, Result};

/// PostgreSQL implementation of LoadEventRepository.
#[derive(Clone)]
pub struct PgLoadEventRepository {
    pool: PgPool,
}

impl PgLoadEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recent events first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<LoadEvent>> {
        let rows = sqlx::query(
            "SELECT loadid, status, load_details, error_message, load_start_time, load_end_time
             FROM load_event ORDER BY load_start_time DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(row_to_event).collect()
    }
}

fn row_to_event(row: sqlx::postgres::PgRow) -> Result<LoadEvent> {
    let status: String = row.get("status");
    Ok(LoadEvent {
        load_id: row.get("loadid"),
        status: status.parse().map_err(Error::Internal)?,
        load_details: row.get("load_details"),
        error_message: row.get("error_message"),
        load_start_time: row.get("load_start_time"),
        load_end_time: row.get("load_end_time"),
    })
}

#[async_trait]
impl LoadEventRepository for PgLoadEventRepository {
    async fn start(&self, load_id: Uuid, details: JsonValue) -> Result<()> {
        sqlx::query(
            "INSERT INTO load_event (loadid, status, load_details, load_start_time)
             VALUES ($1, $2, $3, NOW())",
        )
        .bind(load_id)
        .bind(LoadStatus::Running.as_str())
        .bind(&details)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "load_events",
            op = "start",
            load_id = %load_id,
            "Load event started"
        );
        Ok(())
    }

    async fn set_status(
        &self,
        load_id: Uuid,
        status: LoadStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE load_event
             SET status = $2,
                 error_message = COALESCE($3, error_message),
                 load_end_time = CASE WHEN $4 THEN NOW() ELSE load_end_time END
             WHERE loadid = $1",
        )
        .bind(load_id)
        .bind(status.as_str())
        .bind(error_message)
        .bind(status.is_terminal())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Load event {} not found", load_id)));
        }
        debug!(
            subsystem = "database",
            component = "load_events",
            op = "set_status",
            load_id = %load_id,
            status = status.as_str(),
            "Load event status changed"
        );
        Ok(())
    }

    async fn merge_details(&self, load_id: Uuid, details: JsonValue) -> Result<()> {
        sqlx::query("UPDATE load_event SET load_details = load_details || $2 WHERE loadid = $1")
            .bind(load_id)
            .bind(&details)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, load_id: Uuid) -> Result<Option<LoadEvent>> {
        let row = sqlx::query(
            "SELECT loadid, status, load_details, error_message, load_start_time, load_end_time
             FROM load_event WHERE loadid = $1",
        )
        .bind(load_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(row_to_event).transpose()
    }
}

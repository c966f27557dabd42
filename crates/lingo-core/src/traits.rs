//! Storage traits.
//!
//! The PostgreSQL implementations live in `lingo-db`; orchestration code
//! depends on these traits so it can be exercised against other stores.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::search::LabelRecord;
use crate::staging::StagingBatch;

// =============================================================================
// STAGING
// =============================================================================

/// Counts from promoting one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionSummary {
    pub resources_created: u64,
    pub tiles_written: u64,
    pub tiles_replaced: u64,
    pub resources_skipped: u64,
}

#[async_trait]
pub trait StagingRepository: Send + Sync {
    /// Insert the rows and load errors of a batch.
    async fn insert_batch(&self, batch: &StagingBatch) -> Result<()>;

    /// Fail rows that break nodegroup cardinality; returns how many failed.
    async fn check_cardinality(&self, load_id: Uuid) -> Result<u64>;

    /// Rows of the load that did not pass validation.
    async fn failed_count(&self, load_id: Uuid) -> Result<i64>;

    /// Load errors recorded for the load.
    async fn errors(&self, load_id: Uuid) -> Result<Vec<LoadError>>;

    /// Turn the load's staged rows into resources and tiles.
    async fn promote(&self, load_id: Uuid, overwrite: OverwriteOption) -> Result<PromotionSummary>;

    /// Delete everything the load created; returns the number of tiles removed.
    async fn reverse_load(&self, load_id: Uuid) -> Result<u64>;
}

// =============================================================================
// LOAD EVENTS
// =============================================================================

#[async_trait]
pub trait LoadEventRepository: Send + Sync {
    /// Record a running load.
    async fn start(&self, load_id: Uuid, details: JsonValue) -> Result<()>;

    /// Move a load to `status`, recording an error message for failures.
    async fn set_status(
        &self,
        load_id: Uuid,
        status: LoadStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Merge keys into the load details.
    async fn merge_details(&self, load_id: Uuid, details: JsonValue) -> Result<()>;

    async fn get(&self, load_id: Uuid) -> Result<Option<LoadEvent>>;
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

#[async_trait]
pub trait IdentifierAllocator: Send + Sync {
    /// Reserve `count` consecutive numbers for the scheme and return the
    /// first. Reserved numbers are never handed out again.
    async fn allocate(&self, scheme_id: Uuid, count: i64) -> Result<i64>;

    /// Create the counter if missing and return it.
    async fn ensure_counter(&self, scheme_id: Uuid) -> Result<ConceptIdentifierCounter>;

    /// Change the first number of an unused counter.
    async fn set_counter_start(&self, scheme_id: Uuid, start: i64) -> Result<ConceptIdentifierCounter>;
}

// =============================================================================
// RESOURCES
// =============================================================================

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ResourceInstance>>;

    /// Committed tiles of the given resources.
    async fn tiles_for(&self, resource_ids: &[Uuid]) -> Result<Vec<Tile>>;

    /// Concepts whose `part_of_scheme` points at the scheme.
    async fn concepts_in_scheme(&self, scheme_id: Uuid) -> Result<Vec<Uuid>>;

    /// Label rows of concepts, for search and trees.
    async fn concept_labels(&self, scheme_id: Option<Uuid>) -> Result<Vec<LabelRecord>>;
}

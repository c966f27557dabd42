//! Load orchestration: source → mock tiles → staging → promotion.
//!
//! Every run is tracked by a load event. Failures at any step mark the event
//! `failed` with the error message before the error is returned, so the
//! database always reflects how far a load got.

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use lingo_core::skos::{parse_rdfxml, SkosReader};
use lingo_core::{
    DatatypeRegistry, Error, LegacyMigration, LingoConfig, LoadEventRepository, LoadStatus,
    MigrationContext, NodegroupKind, OverwriteOption, PromotionSummary, ResourceToLoad, Result,
    StagingEngine, StagingRepository,
};

use crate::Database;

/// Where a load reads its thesaurus from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportSource {
    /// A scheme in the legacy RDM tables of the same database.
    Rdm { scheme_id: Uuid },
    /// A SKOS RDF/XML file.
    Skos { path: PathBuf },
}

impl ImportSource {
    fn describe(&self) -> String {
        match self {
            ImportSource::Rdm { scheme_id } => format!("rdm:{}", scheme_id),
            ImportSource::Skos { path } => path.display().to_string(),
        }
    }
}

/// Counts from a successful load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub load_id: Uuid,
    pub scheme_ids: Vec<Uuid>,
    pub resource_count: usize,
    pub row_count: usize,
    pub promotion: PromotionSummary,
}

/// Outcome reported to callers that do not propagate errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub success: bool,
    pub message: String,
    pub load_id: Uuid,
}

/// Display name of a resource: its preferred label in `language`, else the
/// first preferred label.
pub fn display_name(resource: &ResourceToLoad, language: &str) -> Option<String> {
    let labels: Vec<_> = resource
        .tiles_of(NodegroupKind::AppellativeStatus)
        .filter(|t| {
            t.get("appellative_status_ascribed_relation")
                .and_then(|v| v.as_str())
                == Some("prefLabel")
        })
        .collect();
    labels
        .iter()
        .find(|t| {
            t.get("appellative_status_ascribed_name_language")
                .and_then(|v| v.as_str())
                == Some(language)
        })
        .or_else(|| labels.first())
        .and_then(|t| t.get("appellative_status_ascribed_name_content"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

pub struct LingoImporter {
    db: Database,
    config: LingoConfig,
    registry: DatatypeRegistry,
}

impl LingoImporter {
    pub fn new(db: Database, config: LingoConfig) -> Self {
        Self {
            db,
            config,
            registry: DatatypeRegistry::with_builtins(),
        }
    }

    /// Run a load and report the outcome instead of an error.
    pub async fn run(&self, source: &ImportSource, overwrite: OverwriteOption) -> RunOutcome {
        let load_id = Uuid::now_v7();
        match self.execute(load_id, source, overwrite).await {
            Ok(summary) => RunOutcome {
                success: true,
                message: format!(
                    "Loaded {} resources ({} tiles written)",
                    summary.resource_count, summary.promotion.tiles_written
                ),
                load_id,
            },
            Err(e) => RunOutcome {
                success: false,
                message: e.to_string(),
                load_id,
            },
        }
    }

    /// Run a load, recording failure on the load event before returning it.
    pub async fn execute(
        &self,
        load_id: Uuid,
        source: &ImportSource,
        overwrite: OverwriteOption,
    ) -> Result<ImportSummary> {
        let start = Instant::now();
        self.db
            .load_events
            .start(
                load_id,
                json!({
                    "source": source.describe(),
                    "overwrite": matches!(overwrite, OverwriteOption::Overwrite),
                }),
            )
            .await?;

        match self.load(load_id, source, overwrite).await {
            Ok(summary) => {
                info!(
                    subsystem = "database",
                    component = "importer",
                    op = "import",
                    load_id = %load_id,
                    resource_count = summary.resource_count,
                    row_count = summary.row_count,
                    tiles_written = summary.promotion.tiles_written,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Load complete"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(
                    subsystem = "database",
                    component = "importer",
                    op = "import",
                    load_id = %load_id,
                    error = %e,
                    "Load failed"
                );
                if let Err(mark) = self
                    .db
                    .load_events
                    .set_status(load_id, LoadStatus::Failed, Some(&e.to_string()))
                    .await
                {
                    warn!(
                        subsystem = "database",
                        component = "importer",
                        load_id = %load_id,
                        error = %mark,
                        "Could not mark load as failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn resources_from(
        &self,
        load_id: Uuid,
        source: &ImportSource,
        ctx: &mut MigrationContext,
    ) -> Result<(Vec<Uuid>, Vec<ResourceToLoad>)> {
        match source {
            ImportSource::Rdm { scheme_id } => {
                let concepts = self.db.legacy.scheme_concepts(*scheme_id).await?;
                let relations = self.db.legacy.relations().await?;
                let plan = LegacyMigration::new(ctx).plan(*scheme_id, &concepts, &relations)?;
                Ok((vec![plan.scheme_id], plan.resources))
            }
            ImportSource::Skos { path } => {
                let document = tokio::fs::read_to_string(path).await?;
                let graph = parse_rdfxml(&document)?;
                let import = SkosReader::new(ctx, load_id).read(&graph)?;
                if import.scheme_ids.is_empty() {
                    return Err(Error::InvalidInput(format!(
                        "{} contains no skos:ConceptScheme",
                        path.display()
                    )));
                }
                Ok((import.scheme_ids, import.resources))
            }
        }
    }

    async fn load(
        &self,
        load_id: Uuid,
        source: &ImportSource,
        overwrite: OverwriteOption,
    ) -> Result<ImportSummary> {
        let mut ctx = self.db.models.context(&self.config).await?;
        let (scheme_ids, resources) = self.resources_from(load_id, source, &mut ctx).await?;

        let batch = StagingEngine::new(load_id, &ctx, &self.registry).stage(&resources)?;
        self.db.staging.insert_batch(&batch).await?;
        self.db.staging.check_cardinality(load_id).await?;

        let failed = self.db.staging.failed_count(load_id).await?;
        if failed > 0 {
            warn!(
                subsystem = "database",
                component = "importer",
                load_id = %load_id,
                failed_count = failed,
                "Staged rows failed validation; nothing promoted"
            );
            return Err(Error::InvalidInput(format!(
                "{} staged rows failed validation; see load_errors for load {}",
                failed, load_id
            )));
        }
        self.db
            .load_events
            .set_status(load_id, LoadStatus::Validated, None)
            .await?;

        let mut tx = self.db.pool.begin().await.map_err(Error::Database)?;
        self.db.models.persist_discovered(&mut tx, &ctx).await?;
        tx.commit().await.map_err(Error::Database)?;

        let promotion = self.db.staging.promote(load_id, overwrite).await?;

        let language = ctx
            .languages
            .name_for(&ctx.default_language)
            .unwrap_or(&ctx.default_language)
            .to_string();
        let annotations: Vec<(Uuid, Option<String>, Option<String>)> = resources
            .iter()
            .map(|r| (r.resource_id, display_name(r, &language), r.legacy_id.clone()))
            .collect();
        self.db.resources.annotate(&annotations).await?;

        self.db
            .load_events
            .merge_details(
                load_id,
                json!({
                    "scheme_ids": scheme_ids,
                    "resources": resources.len(),
                    "rows": batch.rows.len(),
                    "tiles_written": promotion.tiles_written,
                    "tiles_replaced": promotion.tiles_replaced,
                    "resources_skipped": promotion.resources_skipped,
                }),
            )
            .await?;
        self.db
            .load_events
            .set_status(load_id, LoadStatus::Indexed, None)
            .await?;

        Ok(ImportSummary {
            load_id,
            scheme_ids,
            resource_count: resources.len(),
            row_count: batch.rows.len(),
            promotion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingo_core::{map_value, LanguageLookup, ResourceKind, SourceValue};

    #[test]
    fn test_display_name_prefers_language() {
        let languages = LanguageLookup::with_defaults();
        let mut resource = ResourceToLoad::new(Uuid::nil(), ResourceKind::Concept);
        for value in [
            SourceValue::new("prefLabel", "Stein").with_language("de"),
            SourceValue::new("prefLabel", "Stone").with_language("en"),
            SourceValue::new("altLabel", "Rock").with_language("en"),
        ] {
            resource
                .tiles
                .extend(map_value(&value, ResourceKind::Concept, &languages));
        }
        assert_eq!(display_name(&resource, "English").as_deref(), Some("Stone"));
        assert_eq!(display_name(&resource, "French").as_deref(), Some("Stein"));
    }

    #[test]
    fn test_display_name_without_labels() {
        let resource = ResourceToLoad::new(Uuid::nil(), ResourceKind::Scheme);
        assert_eq!(display_name(&resource, "English"), None);
    }

    #[test]
    fn test_source_description() {
        let id = Uuid::from_u128(5);
        assert_eq!(
            ImportSource::Rdm { scheme_id: id }.describe(),
            format!("rdm:{}", id)
        );
        assert_eq!(
            ImportSource::Skos {
                path: PathBuf::from("data/test.xml")
            }
            .describe(),
            "data/test.xml"
        );
    }
}

//! SKOS export of committed schemes and concept sub-hierarchies.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use lingo_core::defaults::EXPORT_FORMAT;
use lingo_core::skos::{check_format, write_rdfxml, SkosWriter};
use lingo_core::{
    Error, ExportView, LingoConfig, LoadEventRepository, LoadStatus, ResourceKind,
    ResourceRepository, Result,
};

use crate::importer::RunOutcome;
use crate::Database;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// A scheme for a full export, a concept for a partial one.
    pub resource_id: Uuid,
    pub partial: bool,
    /// Target file; defaults to `<export_dir>/<resource_id>.xml`.
    pub output: Option<PathBuf>,
    pub format: String,
}

impl ExportRequest {
    pub fn new(resource_id: Uuid) -> Self {
        Self {
            resource_id,
            partial: false,
            output: None,
            format: EXPORT_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub load_id: Uuid,
    pub path: PathBuf,
    pub resource_count: usize,
    pub triple_count: usize,
}

pub struct LingoExporter {
    db: Database,
    config: LingoConfig,
}

impl LingoExporter {
    pub fn new(db: Database, config: LingoConfig) -> Self {
        Self { db, config }
    }

    /// Export and report the outcome instead of an error.
    pub async fn run(&self, request: &ExportRequest) -> RunOutcome {
        let load_id = Uuid::now_v7();
        match self.execute(load_id, request).await {
            Ok(summary) => RunOutcome {
                success: true,
                message: format!(
                    "Exported {} resources to {}",
                    summary.resource_count,
                    summary.path.display()
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

    /// Export, recording the run as a load event.
    pub async fn execute(&self, load_id: Uuid, request: &ExportRequest) -> Result<ExportSummary> {
        let start = Instant::now();
        self.db
            .load_events
            .start(
                load_id,
                json!({
                    "export": true,
                    "resource_id": request.resource_id,
                    "partial": request.partial,
                    "format": request.format,
                }),
            )
            .await?;

        match self.export(load_id, request).await {
            Ok(summary) => {
                info!(
                    subsystem = "database",
                    component = "exporter",
                    op = "export",
                    load_id = %load_id,
                    resource_count = summary.resource_count,
                    triple_count = summary.triple_count,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Export complete"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(
                    subsystem = "database",
                    component = "exporter",
                    op = "export",
                    load_id = %load_id,
                    error = %e,
                    "Export failed"
                );
                if let Err(mark) = self
                    .db
                    .load_events
                    .set_status(load_id, LoadStatus::Failed, Some(&e.to_string()))
                    .await
                {
                    warn!(
                        subsystem = "database",
                        component = "exporter",
                        load_id = %load_id,
                        error = %mark,
                        "Could not mark export as failed"
                    );
                }
                Err(e)
            }
        }
    }

    fn output_path(&self, request: &ExportRequest) -> PathBuf {
        request.output.clone().unwrap_or_else(|| {
            self.config
                .export_dir
                .join(format!("{}.xml", request.resource_id))
        })
    }

    async fn export(&self, load_id: Uuid, request: &ExportRequest) -> Result<ExportSummary> {
        check_format(&request.format)?;

        let resource = self
            .db
            .resources
            .get(request.resource_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("Resource {} not found", request.resource_id))
            })?;

        let scheme_id = match (resource.kind, request.partial) {
            (ResourceKind::Scheme, false) => resource.id,
            (ResourceKind::Concept, true) => {
                self.db.resources.scheme_of(resource.id).await?.ok_or_else(|| {
                    Error::NotFound(format!("Concept {} is not part of a scheme", resource.id))
                })?
            }
            (ResourceKind::Scheme, true) => {
                return Err(Error::InvalidInput(format!(
                    "{} is a scheme; partial exports start from a concept",
                    resource.id
                )))
            }
            (ResourceKind::Concept, false) => {
                return Err(Error::InvalidInput(format!(
                    "{} is a concept; export its scheme or request a partial export",
                    resource.id
                )))
            }
        };

        let ctx = self.db.models.context(&self.config).await?;
        let resources = self.db.resources.export_resources(scheme_id, &ctx).await?;
        let view = if request.partial {
            ExportView::partial(resource.id, &resources)?
        } else {
            ExportView::full(scheme_id, &resources)?
        };

        let graph = SkosWriter::new(&self.config.export_namespace, &ctx.languages).to_graph(&view)?;
        let document = write_rdfxml(&graph)?;

        let path = self.output_path(request);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, document).await?;

        let scheme_name = resource
            .name
            .clone()
            .unwrap_or_else(|| resource.id.to_string());
        self.db
            .load_events
            .merge_details(
                load_id,
                json!({
                    "scheme_name": scheme_name,
                    "file": { "name": file_name(&path) },
                }),
            )
            .await?;
        self.db
            .load_events
            .set_status(load_id, LoadStatus::Indexed, None)
            .await?;

        Ok(ExportSummary {
            load_id,
            path,
            resource_count: view.resources.len(),
            triple_count: graph.len(),
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = ExportRequest::new(Uuid::nil());
        assert_eq!(request.format, "pretty-xml");
        assert!(!request.partial);
        assert!(request.output.is_none());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("exports/materials.xml")), "materials.xml");
        assert_eq!(file_name(Path::new("plain.xml")), "plain.xml");
    }
}

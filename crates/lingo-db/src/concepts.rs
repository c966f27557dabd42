//! Concept browsing over committed tiles: scheme trees and fuzzy search.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use lingo_core::graph_model::nodes::{
    CLASSIFICATION_STATUS_ASCRIBED_CLASSIFICATION, CLASSIFICATION_STATUS_NODEGROUP,
    SCHEME_NAME_NODEGROUP, TOP_CONCEPT_OF,
};
use lingo_core::mapper::referenced_resources;
use lingo_core::search::{
    paginate, rank_concepts_for_term, ranked_concept_ids, resolve_max_edit_distance,
};
use lingo_core::{
    build_concept_trees, fuzzy_search, HierarchyEdge, LabelRecord, LanguageLookup, LingoConfig,
    OrderMode, Page, ResourceRepository, Result, SchemeTree, Tile,
};

use crate::resources::{labels_from_tiles, PgResourceRepository};

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptMatch {
    pub concept_id: Uuid,
    /// Preferred label in the default language, if any.
    pub label: Option<String>,
}

/// Search request options.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub term: String,
    /// `None` derives the distance from the term and the configured
    /// sensitivity.
    pub max_edit_distance: Option<i64>,
    pub order: OrderMode,
    pub page: usize,
    pub page_size: usize,
}

/// Split hierarchy tiles into (scheme → top concept, broader → narrower) edges.
pub fn tree_edges(tiles: &[Tile]) -> (Vec<HierarchyEdge>, Vec<HierarchyEdge>) {
    let mut top_edges = Vec::new();
    let mut broader_edges = Vec::new();
    for tile in tiles {
        if tile.nodegroup_id == TOP_CONCEPT_OF {
            if let Some(value) = tile.data.get(&TOP_CONCEPT_OF) {
                top_edges.extend(
                    referenced_resources(value)
                        .into_iter()
                        .map(|scheme| HierarchyEdge::new(scheme, tile.resource_id)),
                );
            }
        } else if tile.nodegroup_id == CLASSIFICATION_STATUS_NODEGROUP {
            if let Some(value) = tile.data.get(&CLASSIFICATION_STATUS_ASCRIBED_CLASSIFICATION) {
                broader_edges.extend(
                    referenced_resources(value)
                        .into_iter()
                        .map(|parent| HierarchyEdge::new(parent, tile.resource_id)),
                );
            }
        }
    }
    (top_edges, broader_edges)
}

/// Replace stored language names with codes so labels rank by language.
pub fn with_language_codes(labels: Vec<LabelRecord>, languages: &LanguageLookup) -> Vec<LabelRecord> {
    labels
        .into_iter()
        .map(|mut label| {
            if let Some(code) = label
                .language
                .as_deref()
                .and_then(|name| languages.code_for(name))
            {
                label.language = Some(code.to_string());
            }
            label
        })
        .collect()
}

fn preferred_label(labels: &[LabelRecord], concept_id: Uuid, language: &str) -> Option<String> {
    let pref = || {
        labels
            .iter()
            .filter(move |l| l.concept_id == concept_id && l.valuetype == "prefLabel")
    };
    pref()
        .find(|l| l.language.as_deref() == Some(language))
        .or_else(|| pref().next())
        .map(|l| l.value.clone())
}

/// Read-side concept queries.
#[derive(Clone)]
pub struct ConceptService {
    resources: PgResourceRepository,
}

impl ConceptService {
    pub fn new(resources: PgResourceRepository) -> Self {
        Self { resources }
    }

    /// Every committed scheme as a tree of its concepts.
    pub async fn trees(&self) -> Result<Vec<SchemeTree>> {
        let schemes: Vec<Uuid> = self
            .resources
            .schemes()
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let mut labels = self.resources.concept_labels(None).await?;
        let scheme_names = self
            .resources
            .tiles_in_nodegroups(&[SCHEME_NAME_NODEGROUP])
            .await?;
        labels.extend(labels_from_tiles(&scheme_names));

        let hierarchy_tiles = self
            .resources
            .tiles_in_nodegroups(&[TOP_CONCEPT_OF, CLASSIFICATION_STATUS_NODEGROUP])
            .await?;
        let (top_edges, broader_edges) = tree_edges(&hierarchy_tiles);

        debug!(
            subsystem = "database",
            component = "concepts",
            op = "trees",
            scheme_count = schemes.len(),
            label_count = labels.len(),
            "Building concept trees"
        );
        build_concept_trees(&schemes, &labels, &top_edges, &broader_edges)
    }

    /// Fuzzy label search over every committed concept.
    pub async fn search(
        &self,
        query: &SearchQuery,
        config: &LingoConfig,
        languages: &LanguageLookup,
    ) -> Result<Page<ConceptMatch>> {
        let labels = with_language_codes(self.resources.concept_labels(None).await?, languages);
        let max_edit_distance = query.max_edit_distance.unwrap_or_else(|| {
            resolve_max_edit_distance(&query.term, config.search_term_sensitivity) as i64
        });

        let hits = fuzzy_search(&labels, &query.term, max_edit_distance)?;
        let mut ids = ranked_concept_ids(&hits, &labels, query.order);
        if query.order == OrderMode::Unsorted {
            ids = rank_concepts_for_term(
                &ids,
                &labels,
                &query.term,
                &config.default_language,
                &config.default_language,
            );
        }

        let matches: Vec<ConceptMatch> = ids
            .into_iter()
            .map(|concept_id| ConceptMatch {
                concept_id,
                label: preferred_label(&labels, concept_id, &config.default_language),
            })
            .collect();

        debug!(
            subsystem = "database",
            component = "concepts",
            op = "search",
            max_edit_distance,
            result_count = matches.len(),
            "Concept search"
        );
        Ok(paginate(&matches, query.page, query.page_size))
    }
}

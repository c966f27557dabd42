//! Legacy RDM thesaurus → resources with mock tiles.
//!
//! Legacy concept ids are kept as resource ids. Values become label,
//! identifier and statement tiles; the relation table becomes
//! `top_concept_of`, `classification_status` (broader) and `relation_status`
//! (related) tiles, plus one `part_of_scheme` tile per concept from the
//! hierarchy walk.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::hierarchy::{Hierarchy, HierarchyExtractor};
use crate::lookups::MigrationContext;
use crate::mapper::{handle_unmapped, map_relationship, map_value, Relationship};
use crate::models::{
    LegacyNodeType, LegacyRelation, LegacyRelationType, ResourceKind, ResourceToLoad, SourceValue,
};

/// A legacy concept row with its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyConcept {
    pub id: Uuid,
    pub nodetype: LegacyNodeType,
    pub values: Vec<SourceValue>,
}

impl LegacyConcept {
    /// First `prefLabel`, preferring `language`.
    pub fn preferred_label(&self, language: &str) -> Option<&str> {
        let pref = || self.values.iter().filter(|v| v.valuetype == "prefLabel");
        pref()
            .find(|v| v.language.as_deref() == Some(language))
            .or_else(|| pref().next())
            .map(|v| v.value.as_str())
    }
}

/// Everything needed to stage one legacy scheme.
#[derive(Debug, Clone)]
pub struct LegacyPlan {
    pub scheme_id: Uuid,
    pub hierarchy: Hierarchy,
    /// The scheme first, then its concepts in hierarchy order.
    pub resources: Vec<ResourceToLoad>,
}

impl LegacyPlan {
    pub fn concept_count(&self) -> usize {
        self.resources.len().saturating_sub(1)
    }
}

pub struct LegacyMigration<'a> {
    ctx: &'a MigrationContext,
}

impl<'a> LegacyMigration<'a> {
    pub fn new(ctx: &'a MigrationContext) -> Self {
        Self { ctx }
    }

    /// Plan the migration of `scheme_id`.
    ///
    /// `concepts` must contain the scheme and every concept reachable from
    /// it; `relations` is the whole relation table, so that a concept shared
    /// with another scheme is detected.
    pub fn plan(
        &self,
        scheme_id: Uuid,
        concepts: &[LegacyConcept],
        relations: &[LegacyRelation],
    ) -> Result<LegacyPlan> {
        let by_id: HashMap<Uuid, &LegacyConcept> = concepts.iter().map(|c| (c.id, c)).collect();
        let scheme = by_id
            .get(&scheme_id)
            .filter(|c| c.nodetype == LegacyNodeType::ConceptScheme)
            .ok_or_else(|| Error::NotFound(format!("Scheme {} not found", scheme_id)))?;

        let extractor = HierarchyExtractor::from_legacy(relations);
        let hierarchy = extractor.extract(scheme_id)?;
        let assignment = extractor.assign_schemes(&extractor.roots(), &hierarchy.concepts)?;

        let mut resources = vec![self.resource_from_values(scheme, ResourceKind::Scheme)?];
        let mut index: HashMap<Uuid, usize> = HashMap::new();
        for concept_id in &hierarchy.concepts {
            let concept = by_id
                .get(concept_id)
                .filter(|c| c.nodetype == LegacyNodeType::Concept)
                .ok_or_else(|| {
                    Error::NotFound(format!(
                        "Concept {} referenced by scheme {} not found",
                        concept_id, scheme_id
                    ))
                })?;
            index.insert(*concept_id, resources.len());
            resources.push(self.resource_from_values(concept, ResourceKind::Concept)?);
        }

        let migrating: HashSet<Uuid> = hierarchy.concepts.iter().copied().collect();
        for (resource_id, relationship, target) in
            self.derive_relationships(relations, &migrating, &by_id)
        {
            if let Some(&i) = index.get(&resource_id) {
                resources[i].tiles.push(map_relationship(relationship, target));
            }
        }
        for concept_id in &hierarchy.concepts {
            if let (Some(&i), Some(&scheme)) = (index.get(concept_id), assignment.get(concept_id)) {
                resources[i]
                    .tiles
                    .push(map_relationship(Relationship::PartOfScheme, scheme));
            }
        }

        info!(
            subsystem = "core",
            component = "legacy",
            op = "plan",
            scheme_id = %scheme_id,
            concept_count = hierarchy.concepts.len(),
            path_count = hierarchy.entries.len(),
            "Planned legacy scheme migration"
        );

        Ok(LegacyPlan {
            scheme_id,
            hierarchy,
            resources,
        })
    }

    fn resource_from_values(
        &self,
        concept: &LegacyConcept,
        kind: ResourceKind,
    ) -> Result<ResourceToLoad> {
        let mut resource = ResourceToLoad::new(concept.id, kind);
        resource.legacy_id = Some(concept.id.to_string());

        let mut values: Vec<&SourceValue> = concept.values.iter().collect();
        values.sort_by(|a, b| a.value.cmp(&b.value));
        for value in values {
            match map_value(value, kind, &self.ctx.languages) {
                Some(tile) => resource.tiles.push(tile),
                None => handle_unmapped(concept.id, &value.valuetype, self.ctx.unmapped_policy)?,
            }
        }
        Ok(resource)
    }

    /// (resource, relationship, referenced resource) triples from the
    /// relation table, deduplicated and ordered per resource by the
    /// referenced concept's preferred label.
    pub fn derive_relationships(
        &self,
        relations: &[LegacyRelation],
        migrating: &HashSet<Uuid>,
        concepts: &HashMap<Uuid, &LegacyConcept>,
    ) -> Vec<(Uuid, Relationship, Uuid)> {
        let mut grouped: BTreeMap<(Uuid, u8), Vec<(Relationship, Uuid)>> = BTreeMap::new();
        let mut seen = HashSet::new();
        for rel in relations {
            let derived = match rel.relation_type {
                LegacyRelationType::HasTopConcept if migrating.contains(&rel.to) => {
                    (rel.to, Relationship::TopConceptOf, rel.from)
                }
                LegacyRelationType::Narrower if migrating.contains(&rel.to) => {
                    (rel.to, Relationship::Broader, rel.from)
                }
                LegacyRelationType::Related if migrating.contains(&rel.from) => {
                    (rel.from, Relationship::Related, rel.to)
                }
                _ => continue,
            };
            if !seen.insert(derived) {
                continue;
            }
            let (resource, relationship, target) = derived;
            grouped
                .entry((resource, relationship_order(relationship)))
                .or_default()
                .push((relationship, target));
        }

        let label_of = |id: &Uuid| -> String {
            concepts
                .get(id)
                .and_then(|c| c.preferred_label(&self.ctx.default_language))
                .unwrap_or_default()
                .to_string()
        };
        grouped
            .into_iter()
            .flat_map(|((resource, _), mut targets)| {
                targets.sort_by_cached_key(|(_, target)| (label_of(target), *target));
                targets
                    .into_iter()
                    .map(move |(relationship, target)| (resource, relationship, target))
            })
            .collect()
    }
}

fn relationship_order(relationship: Relationship) -> u8 {
    match relationship {
        Relationship::TopConceptOf => 0,
        Relationship::PartOfScheme => 1,
        Relationship::Broader => 2,
        Relationship::Related => 3,
    }
}

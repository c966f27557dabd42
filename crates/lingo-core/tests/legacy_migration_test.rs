//! Legacy RDM thesaurus → staged tiles → SKOS, without a database.
//!
//! Covers:
//! - poly-hierarchy paths survive planning
//! - staged rows pass validation and re-key back to the same relationships
//! - related edges are stored on the `from` side
//! - the exported graph carries the migrated hierarchy

use std::collections::BTreeSet;

use lingo_core::skos::{vocab, Literal, NamedNode, SkosWriter, Triple};
use lingo_core::{
    DatatypeRegistry, ExportResource, ExportView, LegacyConcept, LegacyMigration, LegacyNodeType,
    LegacyRelation, LegacyRelationType, LingoConfig, MigrationContext, Relationship, ResourceKind,
    SourceValue, StagingEngine,
};
use uuid::Uuid;

const NAMESPACE: &str = "http://localhost:8000/";

struct Thesaurus {
    scheme: Uuid,
    stone: Uuid,
    marble: Uuid,
    granite: Uuid,
    polished: Uuid,
    concepts: Vec<LegacyConcept>,
    relations: Vec<LegacyRelation>,
}

fn concept(id: Uuid, nodetype: LegacyNodeType, values: &[(&str, &str, &str)]) -> LegacyConcept {
    LegacyConcept {
        id,
        nodetype,
        values: values
            .iter()
            .map(|(valuetype, value, language)| {
                SourceValue::new(*valuetype, *value).with_language(*language)
            })
            .collect(),
    }
}

fn rel(from: Uuid, to: Uuid, relation_type: LegacyRelationType) -> LegacyRelation {
    LegacyRelation {
        from,
        to,
        relation_type,
    }
}

/// Stone → {Marble, Granite}; "Polished stone" sits below both.
fn thesaurus() -> Thesaurus {
    let scheme = Uuid::from_u128(0x100);
    let stone = Uuid::from_u128(0x101);
    let marble = Uuid::from_u128(0x102);
    let granite = Uuid::from_u128(0x103);
    let polished = Uuid::from_u128(0x104);
    use LegacyNodeType::{Concept, ConceptScheme};
    use LegacyRelationType::*;
    Thesaurus {
        scheme,
        stone,
        marble,
        granite,
        polished,
        concepts: vec![
            concept(scheme, ConceptScheme, &[("title", "Materials", "en")]),
            concept(
                stone,
                Concept,
                &[
                    ("prefLabel", "Stone", "en"),
                    ("altLabel", "Stein", "de"),
                    ("scopeNote", "Natural rock used in building.", "en"),
                ],
            ),
            concept(marble, Concept, &[("prefLabel", "Marble", "en")]),
            concept(granite, Concept, &[("prefLabel", "Granite", "en")]),
            concept(polished, Concept, &[("prefLabel", "Polished stone", "en")]),
        ],
        relations: vec![
            rel(scheme, stone, HasTopConcept),
            rel(stone, marble, Narrower),
            rel(stone, granite, Narrower),
            rel(marble, polished, Narrower),
            rel(granite, polished, Narrower),
            rel(marble, granite, Related),
        ],
    }
}

#[test]
fn test_plan_tracks_every_path() {
    let t = thesaurus();
    let ctx = MigrationContext::builtin(&LingoConfig::default());
    let plan = LegacyMigration::new(&ctx)
        .plan(t.scheme, &t.concepts, &t.relations)
        .unwrap();

    assert_eq!(plan.concept_count(), 4);
    let paths = plan.hierarchy.paths_to(t.polished);
    assert_eq!(paths.len(), 2);
    assert!(paths.contains(&vec![t.scheme, t.stone, t.marble, t.polished]));
    assert!(paths.contains(&vec![t.scheme, t.stone, t.granite, t.polished]));
    assert!(plan
        .hierarchy
        .entries
        .iter()
        .filter(|e| e.concept == t.polished)
        .all(|e| e.depth == 3));
}

#[test]
fn test_staged_plan_round_trips_through_tiles() {
    let t = thesaurus();
    let ctx = MigrationContext::builtin(&LingoConfig::default());
    let registry = DatatypeRegistry::with_builtins();
    let plan = LegacyMigration::new(&ctx)
        .plan(t.scheme, &t.concepts, &t.relations)
        .unwrap();

    let batch = StagingEngine::new(Uuid::from_u128(1), &ctx, &registry)
        .stage(&plan.resources)
        .unwrap();
    assert!(batch.passes(), "unexpected load errors: {:?}", batch.errors);
    assert!(batch.errors.is_empty());

    let tiles = batch.to_tiles();
    let loaded: Vec<ExportResource> = plan
        .resources
        .iter()
        .map(|r| ExportResource::from_tiles(r.resource_id, ctx.graph(r.kind), &tiles))
        .collect();

    let polished = loaded.iter().find(|r| r.resource_id == t.polished).unwrap();
    let parents: BTreeSet<Uuid> = polished
        .references(Relationship::Broader)
        .into_iter()
        .collect();
    assert_eq!(parents, BTreeSet::from([t.marble, t.granite]));
    assert_eq!(polished.scheme(), Some(t.scheme));

    let marble = loaded.iter().find(|r| r.resource_id == t.marble).unwrap();
    assert_eq!(marble.references(Relationship::Related), vec![t.granite]);
    let granite = loaded.iter().find(|r| r.resource_id == t.granite).unwrap();
    assert!(granite.references(Relationship::Related).is_empty());

    let stone = loaded.iter().find(|r| r.resource_id == t.stone).unwrap();
    assert_eq!(stone.references(Relationship::TopConceptOf), vec![t.scheme]);
}

#[test]
fn test_migrated_scheme_exports_hierarchy() {
    let t = thesaurus();
    let ctx = MigrationContext::builtin(&LingoConfig::default());
    let registry = DatatypeRegistry::with_builtins();
    let plan = LegacyMigration::new(&ctx)
        .plan(t.scheme, &t.concepts, &t.relations)
        .unwrap();
    let tiles = StagingEngine::new(Uuid::from_u128(2), &ctx, &registry)
        .stage(&plan.resources)
        .unwrap()
        .to_tiles();
    let loaded: Vec<ExportResource> = plan
        .resources
        .iter()
        .map(|r| ExportResource::from_tiles(r.resource_id, ctx.graph(r.kind), &tiles))
        .collect();

    let view = ExportView::full(t.scheme, &loaded).unwrap();
    assert_eq!(view.scheme().unwrap().kind, ResourceKind::Scheme);
    let graph = SkosWriter::new(NAMESPACE, &ctx.languages)
        .to_graph(&view)
        .unwrap();

    let subject = |id: Uuid| NamedNode::new_unchecked(format!("{}{}", NAMESPACE, id));
    let label = |value: &str, lang: &str| Literal::new_language_tagged_literal(value, lang).unwrap();
    assert!(graph.contains(&Triple::new(
        subject(t.scheme),
        vocab::skos("hasTopConcept"),
        subject(t.stone)
    )));
    assert!(graph.contains(&Triple::new(
        subject(t.scheme),
        vocab::skos("prefLabel"),
        label("Materials", "en")
    )));
    assert!(graph.contains(&Triple::new(
        subject(t.stone),
        vocab::skos("altLabel"),
        label("Stein", "de")
    )));
    assert!(graph.contains(&Triple::new(
        subject(t.stone),
        vocab::skos("scopeNote"),
        label("Natural rock used in building.", "en")
    )));
    assert!(graph.contains(&Triple::new(
        subject(t.polished),
        vocab::skos("broader"),
        subject(t.marble)
    )));
    assert!(graph.contains(&Triple::new(
        subject(t.marble),
        vocab::skos("related"),
        subject(t.granite)
    )));
}

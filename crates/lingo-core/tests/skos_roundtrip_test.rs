//! SKOS import → export round trips over the "Test Scheme" fixture.
//!
//! Covers:
//! - (predicate, object) pairs survive import and export per subject
//! - partial export promotes a concept to a scheme
//! - fuzzy search over the imported labels

use std::collections::{BTreeMap, BTreeSet, HashMap};

use lingo_core::search::{fuzzy_search, ranked_concept_ids, LabelRecord, OrderMode};
use lingo_core::skos::{
    parse_rdfxml, vocab, Literal, NamedNode, RdfGraph, SkosImport, SkosReader, SkosWriter,
    Subject, Term, Triple,
};
use lingo_core::triples::{extract_all, TripleObject};
use lingo_core::{
    ExportResource, ExportView, LingoConfig, MigrationContext, NodegroupKind, ResourceKind,
};
use uuid::Uuid;

const FIXTURE: &str = include_str!("fixtures/test_scheme.xml");
const NAMESPACE: &str = "http://localhost:8000/";
const BASE: &str = "http://vocab.example.org/";

// =============================================================================
// HELPERS
// =============================================================================

fn import_fixture() -> (SkosImport, MigrationContext, RdfGraph) {
    let mut ctx = MigrationContext::builtin(&LingoConfig::default());
    let graph = parse_rdfxml(FIXTURE).expect("fixture parses");
    let import = SkosReader::new(&mut ctx, Uuid::from_u128(42))
        .read(&graph)
        .expect("fixture imports");
    (import, ctx, graph)
}

fn export_resources(import: &SkosImport) -> Vec<ExportResource> {
    import
        .resources
        .iter()
        .map(ExportResource::from_load)
        .collect()
}

fn object_key(term: &Term, rename: &dyn Fn(&str) -> String) -> String {
    match term {
        Term::NamedNode(n) => rename(n.as_str()),
        Term::BlankNode(b) => b.to_string(),
        Term::Literal(l) => format!("{}@{}", l.value(), l.language().unwrap_or("")),
    }
}

fn subject_key(subject: &Subject, rename: &dyn Fn(&str) -> String) -> String {
    match subject {
        Subject::NamedNode(n) => rename(n.as_str()),
        Subject::BlankNode(b) => b.to_string(),
    }
}

/// subject → {(predicate, object)} with IRIs passed through `rename`.
fn pairs_by_subject(
    graph: &RdfGraph,
    rename: &dyn Fn(&str) -> String,
) -> BTreeMap<String, BTreeSet<(String, String)>> {
    let mut out: BTreeMap<String, BTreeSet<(String, String)>> = BTreeMap::new();
    for triple in graph.iter() {
        out.entry(subject_key(&triple.subject, rename))
            .or_default()
            .insert((
                triple.predicate.as_str().to_string(),
                object_key(&triple.object, rename),
            ));
    }
    out
}

fn iri(local: &str) -> String {
    format!("{}{}", BASE, local)
}

// =============================================================================
// ROUND TRIP
// =============================================================================

#[test]
fn test_fixture_shape() {
    let (import, _, _) = import_fixture();
    assert_eq!(import.scheme_count(), 1);
    assert_eq!(import.concept_count(), 5);

    let scheme_id = import.scheme_ids[0];
    let view = ExportView::full(scheme_id, &export_resources(&import)).unwrap();
    let top: Vec<Uuid> = view
        .concepts()
        .filter(|c| c.tiles_of(NodegroupKind::TopConceptOf).next().is_some())
        .map(|c| c.resource_id)
        .collect();
    assert_eq!(top, vec![import.ids_by_iri[&iri("concept-1")]]);

    let concept_1 = import.ids_by_iri[&iri("concept-1")];
    let narrower = view
        .concepts()
        .filter(|c| {
            c.references(lingo_core::Relationship::Broader)
                .contains(&concept_1)
        })
        .count();
    assert_eq!(narrower, 4);
}

#[test]
fn test_export_of_import_keeps_predicate_object_pairs() {
    let (import, ctx, original) = import_fixture();
    let scheme_id = import.scheme_ids[0];
    let view = ExportView::full(scheme_id, &export_resources(&import)).unwrap();

    let document = SkosWriter::new(NAMESPACE, &ctx.languages)
        .write(&view, "pretty-xml")
        .unwrap();
    let exported = parse_rdfxml(&document).unwrap();

    let iri_by_id: HashMap<String, String> = import
        .ids_by_iri
        .iter()
        .map(|(iri, id)| (format!("{}{}", NAMESPACE, id), iri.clone()))
        .collect();
    let back = |iri: &str| iri_by_id.get(iri).cloned().unwrap_or_else(|| iri.to_string());
    let same = |iri: &str| iri.to_string();

    assert_eq!(pairs_by_subject(&exported, &back), pairs_by_subject(&original, &same));
}

#[test]
fn test_export_is_stable() {
    let (import, ctx, _) = import_fixture();
    let view = ExportView::full(import.scheme_ids[0], &export_resources(&import)).unwrap();
    let writer = SkosWriter::new(NAMESPACE, &ctx.languages);
    assert_eq!(
        writer.write(&view, "xml").unwrap(),
        writer.write(&view, "xml").unwrap()
    );
}

#[test]
fn test_unsupported_format_rejected() {
    let (import, ctx, _) = import_fixture();
    let view = ExportView::full(import.scheme_ids[0], &export_resources(&import)).unwrap();
    let err = SkosWriter::new(NAMESPACE, &ctx.languages)
        .write(&view, "turtle")
        .unwrap_err();
    assert_eq!(err.to_string(), "Unsupported export format: turtle");
}

// =============================================================================
// PARTIAL EXPORT
// =============================================================================

#[test]
fn test_partial_export_of_concept_1() {
    let (import, ctx, _) = import_fixture();
    let concept_1 = import.ids_by_iri[&iri("concept-1")];
    let children: BTreeSet<Uuid> = (2..=5)
        .map(|n| import.ids_by_iri[&iri(&format!("concept-{}", n))])
        .collect();

    let resources = export_resources(&import);
    let view = ExportView::partial(concept_1, &resources).unwrap();
    assert_eq!(view.scheme_id, concept_1);
    assert_eq!(view.scheme().unwrap().kind, ResourceKind::Scheme);
    assert_eq!(view.concepts().count(), 4);

    let graph = SkosWriter::new(NAMESPACE, &ctx.languages)
        .to_graph(&view)
        .unwrap();
    let node = |id: Uuid| NamedNode::new_unchecked(format!("{}{}", NAMESPACE, id));
    let root = Subject::from(node(concept_1));

    assert!(graph.contains(&Triple::new(
        root.clone(),
        vocab::RDF_TYPE,
        vocab::skos("ConceptScheme")
    )));
    assert!(!graph.contains(&Triple::new(
        root.clone(),
        vocab::RDF_TYPE,
        vocab::skos("Concept")
    )));

    let top: BTreeSet<Uuid> = graph
        .objects(&root, &vocab::skos("hasTopConcept"))
        .filter_map(|o| match o {
            Term::NamedNode(n) => n.as_str().strip_prefix(NAMESPACE),
            _ => None,
        })
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect();
    assert_eq!(top, children);

    assert_eq!(graph.objects(&root, &vocab::skos("broader")).count(), 0);
    assert_eq!(graph.objects(&root, &vocab::skos("inScheme")).count(), 0);
    for child in &children {
        let child = Subject::from(node(*child));
        assert_eq!(graph.objects(&child, &vocab::skos("broader")).count(), 0);
        assert!(graph.contains(&Triple::new(
            child,
            vocab::skos("inScheme"),
            node(concept_1)
        )));
    }

    // The root keeps its definition as a scheme-level statement.
    assert!(graph.contains(&Triple::new(
        root,
        vocab::skos("definition"),
        Literal::new_language_tagged_literal("The only top concept.", "en").unwrap()
    )));
}

#[test]
fn test_partial_export_leaves_loaded_resources_untouched() {
    let (import, _, _) = import_fixture();
    let resources = export_resources(&import);
    let before = resources.clone();
    let concept_1 = import.ids_by_iri[&iri("concept-1")];
    ExportView::partial(concept_1, &resources).unwrap();
    assert_eq!(resources, before);
}

// =============================================================================
// SEARCH
// =============================================================================

fn concept_labels(import: &SkosImport) -> Vec<LabelRecord> {
    import
        .resources
        .iter()
        .filter(|r| r.kind == ResourceKind::Concept)
        .flat_map(|r| {
            extract_all(ResourceKind::Concept, &r.tiles)
                .into_iter()
                .filter(|t| t.predicate.ends_with("Label"))
                .filter_map(move |t| match t.object {
                    TripleObject::Literal(value) => {
                        Some(LabelRecord::new(r.resource_id, value, t.predicate.clone()))
                    }
                    TripleObject::Resource(_) => None,
                })
        })
        .collect()
}

#[test]
fn test_fuzzy_search_over_fixture() {
    let (import, _, _) = import_fixture();
    let labels = concept_labels(&import);
    assert!(labels.iter().any(|l| l.valuetype == "altLabel"));

    let exact = fuzzy_search(&labels, "Concept 1", 0).unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].concept_id, import.ids_by_iri[&iri("concept-1")]);

    let loose = fuzzy_search(&labels, "Concept 1", 2).unwrap();
    let ids = ranked_concept_ids(&loose, &labels, OrderMode::Alphabetical);
    assert_eq!(ids.len(), 5);
    assert_eq!(ids[0], import.ids_by_iri[&iri("concept-1")]);
}

#[test]
fn test_fuzzy_search_containment_is_case_insensitive() {
    let (import, _, _) = import_fixture();
    let labels = concept_labels(&import);
    let hits = fuzzy_search(&labels, "con", 0).unwrap();
    assert_eq!(hits.len(), 5);
    assert!(hits.iter().all(|h| h.label.starts_with("Concept")));
}

//! SKOS graph → resources with mock tiles.

use std::collections::{BTreeMap, HashSet};

use oxrdf::{Subject, Term};
use tracing::info;
use uuid::Uuid;

use super::graph::RdfGraph;
use super::vocab;
use crate::error::{Error, Result};
use crate::lookups::MigrationContext;
use crate::mapper::{self, Relationship};
use crate::models::{MockTile, NodegroupKind, ResourceKind, ResourceToLoad, SourceValue};

/// Result of reading one SKOS file.
#[derive(Debug, Clone, Default)]
pub struct SkosImport {
    /// Schemes first, then concepts, in document order.
    pub resources: Vec<ResourceToLoad>,
    pub scheme_ids: Vec<Uuid>,
    /// Original subject IRI → minted resource id.
    pub ids_by_iri: BTreeMap<String, Uuid>,
}

impl SkosImport {
    pub fn scheme_count(&self) -> usize {
        self.scheme_ids.len()
    }

    pub fn concept_count(&self) -> usize {
        self.resources.len() - self.scheme_ids.len()
    }
}

/// Reads `skos:ConceptScheme` and `skos:Concept` subjects into
/// [`ResourceToLoad`]s.
///
/// Resource ids are UUIDv5 over `seed` and the subject IRI, so reading the
/// same file twice with the same seed yields the same ids.
pub struct SkosReader<'a> {
    ctx: &'a mut MigrationContext,
    seed: Uuid,
}

impl<'a> SkosReader<'a> {
    pub fn new(ctx: &'a mut MigrationContext, seed: Uuid) -> Self {
        Self { ctx, seed }
    }

    pub fn subject_id(&self, iri: &str) -> Uuid {
        Uuid::new_v5(&self.seed, iri.as_bytes())
    }

    pub fn read(&mut self, graph: &RdfGraph) -> Result<SkosImport> {
        let schemes: Vec<&Subject> = graph.subjects_of_type(&vocab::skos("ConceptScheme"));
        let scheme_set: HashSet<&Subject> = schemes.iter().copied().collect();
        let concepts: Vec<&Subject> = graph
            .subjects_of_type(&vocab::skos("Concept"))
            .into_iter()
            .filter(|s| !scheme_set.contains(s))
            .collect();
        let known: HashSet<String> = schemes
            .iter()
            .chain(concepts.iter())
            .map(|s| subject_key(s))
            .collect();

        self.register_languages(graph);

        let mut import = SkosImport::default();
        let mut resources: BTreeMap<Uuid, ResourceToLoad> = BTreeMap::new();
        let mut order = Vec::new();
        for (subject, kind) in schemes
            .iter()
            .map(|s| (*s, ResourceKind::Scheme))
            .chain(concepts.iter().map(|c| (*c, ResourceKind::Concept)))
        {
            let iri = subject_key(subject);
            let id = self.subject_id(&iri);
            let mut resource = ResourceToLoad::new(id, kind);
            resource.legacy_id = Some(iri.clone());
            import.ids_by_iri.insert(iri, id);
            if kind == ResourceKind::Scheme {
                import.scheme_ids.push(id);
            }
            resources.insert(id, resource);
            order.push(id);
        }

        // Tiles that belong to a resource other than the subject being read.
        let mut deferred: Vec<(Uuid, MockTile)> = Vec::new();

        for (subject, kind) in schemes
            .iter()
            .map(|s| (*s, ResourceKind::Scheme))
            .chain(concepts.iter().map(|c| (*c, ResourceKind::Concept)))
        {
            let iri = subject_key(subject);
            let id = self.subject_id(&iri);
            let mut tiles = Vec::new();

            for triple in graph.triples_for(subject) {
                if triple.predicate == vocab::RDF_TYPE {
                    continue;
                }
                let predicate = triple.predicate.as_str();
                let target: Subject = match &triple.object {
                    Term::Literal(literal) => {
                        self.read_literal(id, kind, predicate, literal.value(), literal.language(), &mut tiles)?;
                        continue;
                    }
                    Term::NamedNode(n) => n.clone().into(),
                    Term::BlankNode(b) => b.clone().into(),
                };
                if let Some(name) = vocab::match_predicate(predicate) {
                    let matched = matched_identifier(graph, &target);
                    tiles.push(mapper::map_match(name, &matched, kind));
                    continue;
                }

                let target_key = subject_key(&target);
                let resolve = || -> Result<Uuid> {
                    if known.contains(&target_key) {
                        Ok(self.subject_id(&target_key))
                    } else {
                        Err(Error::NotFound(format!(
                            "Resource '{}' referenced by '{}' is not defined in the file",
                            target_key, iri
                        )))
                    }
                };
                match (kind, vocab::split_iri(predicate)) {
                    (ResourceKind::Scheme, (vocab::SKOS, "hasTopConcept")) => {
                        let concept = resolve()?;
                        deferred.push((concept, mapper::map_relationship(Relationship::TopConceptOf, id)));
                        deferred.push((concept, mapper::map_relationship(Relationship::PartOfScheme, id)));
                    }
                    (ResourceKind::Concept, (vocab::SKOS, "topConceptOf")) => {
                        let scheme = resolve()?;
                        tiles.push(mapper::map_relationship(Relationship::TopConceptOf, scheme));
                        tiles.push(mapper::map_relationship(Relationship::PartOfScheme, scheme));
                    }
                    (ResourceKind::Concept, (vocab::SKOS, "inScheme")) => {
                        let scheme = resolve()?;
                        tiles.push(mapper::map_relationship(Relationship::PartOfScheme, scheme));
                    }
                    (ResourceKind::Concept, (vocab::SKOS, "broader")) => {
                        let parent = resolve()?;
                        tiles.push(mapper::map_relationship(Relationship::Broader, parent));
                    }
                    (ResourceKind::Concept, (vocab::SKOS, "narrower")) => {
                        let child = resolve()?;
                        deferred.push((child, mapper::map_relationship(Relationship::Broader, id)));
                    }
                    (ResourceKind::Concept, (vocab::SKOS, "related")) => {
                        let other = resolve()?;
                        tiles.push(mapper::map_relationship(Relationship::Related, other));
                    }
                    _ => {
                        mapper::handle_unmapped(id, predicate, self.ctx.unmapped_policy)?;
                    }
                }
            }

            if let Some(resource) = resources.get_mut(&id) {
                resource.tiles.extend(tiles);
            }
        }

        for (target, tile) in deferred {
            if let Some(resource) = resources.get_mut(&target) {
                resource.tiles.push(tile);
            }
        }

        let single_scheme = match import.scheme_ids.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        for id in &order {
            let Some(resource) = resources.get_mut(id) else {
                continue;
            };
            dedupe_tiles(&mut resource.tiles);
            if !resource.has_tile(NodegroupKind::Identifier) {
                if let Some(iri) = resource.legacy_id.clone() {
                    resource.tiles.push(
                        MockTile::new(NodegroupKind::Identifier)
                            .with("identifier_content", serde_json::json!(iri))
                            .with("identifier_type", serde_json::json!("identifier")),
                    );
                }
            }
            if resource.kind == ResourceKind::Concept {
                check_single_scheme(resource)?;
                if !resource.has_tile(NodegroupKind::PartOfScheme) {
                    if let Some(scheme) = single_scheme {
                        resource
                            .tiles
                            .push(mapper::map_relationship(Relationship::PartOfScheme, scheme));
                    }
                }
            }
        }

        import.resources = order
            .iter()
            .filter_map(|id| resources.remove(id))
            .collect();

        info!(
            subsystem = "core",
            component = "skos_reader",
            op = "read",
            scheme_count = import.scheme_count(),
            concept_count = import.concept_count(),
            triple_count = graph.len(),
            "Read SKOS graph"
        );
        Ok(import)
    }

    fn register_languages(&mut self, graph: &RdfGraph) {
        let mut seen = HashSet::new();
        for triple in graph.iter() {
            if let Term::Literal(literal) = &triple.object {
                if let Some(lang) = literal.language() {
                    if seen.insert(lang) {
                        self.ctx.ensure_language(lang);
                    }
                }
            }
        }
    }

    fn read_literal(
        &self,
        id: Uuid,
        kind: ResourceKind,
        predicate: &str,
        value: &str,
        language: Option<&str>,
        tiles: &mut Vec<MockTile>,
    ) -> Result<()> {
        let Some(valuetype) = vocab::value_predicate(predicate) else {
            return mapper::handle_unmapped(id, predicate, self.ctx.unmapped_policy);
        };
        let language = language.unwrap_or(&self.ctx.default_language);
        let source = SourceValue::new(valuetype, value).with_language(language);
        match mapper::map_value(&source, kind, &self.ctx.languages) {
            Some(tile) => tiles.push(tile),
            None => mapper::handle_unmapped(id, valuetype, self.ctx.unmapped_policy)?,
        }
        Ok(())
    }
}

/// IRI of a named subject, `_:id` of a blank one.
fn subject_key(subject: &Subject) -> String {
    match subject {
        Subject::NamedNode(n) => n.as_str().to_string(),
        Subject::BlankNode(b) => b.to_string(),
    }
}

/// `dcterms:identifier` of a matched resource, or its IRI when it has none.
fn matched_identifier(graph: &RdfGraph, target: &Subject) -> String {
    graph
        .objects(target, &vocab::dcterms("identifier"))
        .find_map(|term| match term {
            Term::Literal(literal) => Some(literal.value().to_string()),
            _ => None,
        })
        .unwrap_or_else(|| subject_key(target))
}

fn dedupe_tiles(tiles: &mut Vec<MockTile>) {
    let mut kept: Vec<MockTile> = Vec::with_capacity(tiles.len());
    for tile in tiles.drain(..) {
        if !kept.contains(&tile) {
            kept.push(tile);
        }
    }
    *tiles = kept;
}

fn check_single_scheme(resource: &ResourceToLoad) -> Result<()> {
    let mut schemes = resource
        .tiles_of(NodegroupKind::PartOfScheme)
        .filter_map(|t| t.get(Relationship::PartOfScheme.node_alias()))
        .flat_map(mapper::referenced_resources);
    if let Some(existing) = schemes.next() {
        if let Some(current) = schemes.find(|s| *s != existing) {
            return Err(Error::SchemeConflict {
                concept: resource.resource_id,
                existing,
                current,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LingoConfig;
    use crate::skos::rdfxml::parse_rdfxml;
    use serde_json::json;

    const DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:skos="http://www.w3.org/2004/02/skos/core#"
         xmlns:dcterms="http://purl.org/dc/terms/">
  <skos:ConceptScheme rdf:about="http://ex.org/s">
    <dcterms:title xml:lang="en">Materials</dcterms:title>
    <skos:hasTopConcept rdf:resource="http://ex.org/c/wood"/>
  </skos:ConceptScheme>
  <skos:Concept rdf:about="http://ex.org/c/wood">
    <skos:prefLabel xml:lang="en">Wood</skos:prefLabel>
    <skos:prefLabel xml:lang="cy">Pren</skos:prefLabel>
    <skos:narrower rdf:resource="http://ex.org/c/oak"/>
    <skos:exactMatch rdf:resource="http://vocab.example/aat/300011914"/>
  </skos:Concept>
  <skos:Concept rdf:about="http://ex.org/c/oak">
    <skos:prefLabel xml:lang="en">Oak</skos:prefLabel>
    <skos:broader rdf:resource="http://ex.org/c/wood"/>
    <skos:related rdf:resource="http://ex.org/c/wood"/>
    <dcterms:identifier>oak-1</dcterms:identifier>
  </skos:Concept>
  <rdf:Description rdf:about="http://vocab.example/aat/300011914">
    <dcterms:identifier>300011914</dcterms:identifier>
  </rdf:Description>
</rdf:RDF>"#;

    fn read(doc: &str) -> (Result<SkosImport>, MigrationContext) {
        let mut ctx = MigrationContext::builtin(&LingoConfig::default());
        let graph = parse_rdfxml(doc).unwrap();
        let seed = Uuid::from_u128(7);
        let result = SkosReader::new(&mut ctx, seed).read(&graph);
        (result, ctx)
    }

    fn find<'a>(import: &'a SkosImport, iri: &str) -> &'a ResourceToLoad {
        let id = import.ids_by_iri[iri];
        import.resources.iter().find(|r| r.resource_id == id).unwrap()
    }

    #[test]
    fn test_ids_are_deterministic() {
        let (first, _) = read(DOC);
        let (second, _) = read(DOC);
        assert_eq!(first.unwrap().ids_by_iri, second.unwrap().ids_by_iri);
    }

    #[test]
    fn test_schemes_before_concepts() {
        let (import, _) = read(DOC);
        let import = import.unwrap();
        assert_eq!(import.scheme_count(), 1);
        assert_eq!(import.concept_count(), 2);
        assert_eq!(import.resources[0].kind, ResourceKind::Scheme);
    }

    #[test]
    fn test_top_concept_and_membership() {
        let (import, _) = read(DOC);
        let import = import.unwrap();
        let scheme = import.scheme_ids[0];
        let wood = find(&import, "http://ex.org/c/wood");
        let top = wood.tiles_of(NodegroupKind::TopConceptOf).next().unwrap();
        assert_eq!(
            mapper::referenced_resources(top.get("top_concept_of").unwrap()),
            vec![scheme]
        );
        // Oak has no explicit inScheme; the only scheme in the file is used.
        let oak = find(&import, "http://ex.org/c/oak");
        assert!(oak.has_tile(NodegroupKind::PartOfScheme));
    }

    #[test]
    fn test_broader_and_narrower_collapse_to_one_tile() {
        let (import, _) = read(DOC);
        let import = import.unwrap();
        let oak = find(&import, "http://ex.org/c/oak");
        assert_eq!(oak.tiles_of(NodegroupKind::ClassificationStatus).count(), 1);
        assert_eq!(oak.tiles_of(NodegroupKind::RelationStatus).count(), 1);
    }

    #[test]
    fn test_match_resolves_identifier() {
        let (import, _) = read(DOC);
        let import = import.unwrap();
        let wood = find(&import, "http://ex.org/c/wood");
        let statement = wood.tiles_of(NodegroupKind::Statement).next().unwrap();
        assert_eq!(statement.get("statement_type"), Some(&json!("exactMatch")));
        assert_eq!(statement.get("statement_content"), Some(&json!("300011914")));
    }

    #[test]
    fn test_identifier_falls_back_to_iri() {
        let (import, _) = read(DOC);
        let import = import.unwrap();
        let wood = find(&import, "http://ex.org/c/wood");
        let ident = wood.tiles_of(NodegroupKind::Identifier).next().unwrap();
        assert_eq!(ident.get("identifier_content"), Some(&json!("http://ex.org/c/wood")));
        let oak = find(&import, "http://ex.org/c/oak");
        let ident = oak.tiles_of(NodegroupKind::Identifier).next().unwrap();
        assert_eq!(ident.get("identifier_content"), Some(&json!("oak-1")));
    }

    #[test]
    fn test_unknown_language_registered() {
        let (import, ctx) = read(DOC);
        import.unwrap();
        assert!(ctx.languages.contains_code("cy"));
        assert_eq!(ctx.lists.discovered().len(), 1);
    }

    #[test]
    fn test_two_schemes_conflict() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                              xmlns:skos="http://www.w3.org/2004/02/skos/core#">
          <skos:ConceptScheme rdf:about="http://ex.org/s1"/>
          <skos:ConceptScheme rdf:about="http://ex.org/s2"/>
          <skos:Concept rdf:about="http://ex.org/c">
            <skos:inScheme rdf:resource="http://ex.org/s1"/>
            <skos:inScheme rdf:resource="http://ex.org/s2"/>
          </skos:Concept>
        </rdf:RDF>"#;
        let (result, _) = read(doc);
        assert!(matches!(result, Err(Error::SchemeConflict { .. })));
    }

    #[test]
    fn test_relative_references_resolve_against_xml_base() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                              xmlns:skos="http://www.w3.org/2004/02/skos/core#"
                              xmlns:dcterms="http://purl.org/dc/terms/"
                              xml:base="http://ex.org/" xml:lang="en">
          <skos:Concept rdf:about="c0">
            <skos:prefLabel>Root</skos:prefLabel>
            <dcterms:identifier rdf:datatype="http://www.w3.org/2001/XMLSchema#string">1</dcterms:identifier>
          </skos:Concept>
          <skos:Concept rdf:about="http://ex.org/c1">
            <skos:prefLabel>Child</skos:prefLabel>
            <skos:broader rdf:resource="http://ex.org/c0"/>
          </skos:Concept>
        </rdf:RDF>"#;
        let (import, _) = read(doc);
        let import = import.unwrap();
        assert_eq!(
            import.ids_by_iri.keys().collect::<Vec<_>>(),
            vec!["http://ex.org/c0", "http://ex.org/c1"]
        );
        let child = find(&import, "http://ex.org/c1");
        let broader = child.tiles_of(NodegroupKind::ClassificationStatus).next().unwrap();
        assert_eq!(
            mapper::referenced_resources(broader.get(Relationship::Broader.node_alias()).unwrap()),
            vec![import.ids_by_iri["http://ex.org/c0"]]
        );
        let root = find(&import, "http://ex.org/c0");
        let ident = root.tiles_of(NodegroupKind::Identifier).next().unwrap();
        assert_eq!(ident.get("identifier_content"), Some(&json!("1")));
    }

    #[test]
    fn test_dangling_reference_not_found() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                              xmlns:skos="http://www.w3.org/2004/02/skos/core#">
          <skos:Concept rdf:about="http://ex.org/c">
            <skos:broader rdf:resource="http://ex.org/missing"/>
          </skos:Concept>
        </rdf:RDF>"#;
        let (result, _) = read(doc);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}

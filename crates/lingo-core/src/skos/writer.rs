//! Export view → SKOS graph.

use oxrdf::{Literal, NamedNode, Term};
use uuid::Uuid;

use super::graph::RdfGraph;
use super::rdfxml::write_rdfxml;
use super::vocab;
use crate::error::{Error, Result};
use crate::export::ExportView;
use crate::lookups::LanguageLookup;
use crate::triples::{extract_all, predicate_iri, TripleObject};

/// Serialization formats accepted by the exporter.
pub const SUPPORTED_FORMATS: &[&str] = &["pretty-xml", "xml"];

pub fn check_format(format: &str) -> Result<()> {
    if SUPPORTED_FORMATS.contains(&format) {
        Ok(())
    } else {
        Err(Error::UnsupportedFormat(format.to_string()))
    }
}

pub struct SkosWriter<'a> {
    namespace: &'a str,
    languages: &'a LanguageLookup,
}

impl<'a> SkosWriter<'a> {
    pub fn new(namespace: &'a str, languages: &'a LanguageLookup) -> Self {
        Self {
            namespace,
            languages,
        }
    }

    pub fn subject_iri(&self, id: Uuid) -> NamedNode {
        NamedNode::new_unchecked(format!("{}{}", self.namespace, id))
    }

    /// Tiles store language names; literals are tagged with the code.
    fn literal(&self, value: &str, stored_language: Option<&str>) -> Result<Literal> {
        match stored_language {
            Some(name) => {
                let code = self.languages.code_for(name).unwrap_or(name);
                Literal::new_language_tagged_literal(value, code).map_err(|e| {
                    Error::Rdf(format!("Invalid language tag '{}' on '{}': {}", code, value, e))
                })
            }
            None => Ok(Literal::new_simple_literal(value)),
        }
    }

    pub fn to_graph(&self, view: &ExportView) -> Result<RdfGraph> {
        let mut graph = RdfGraph::new();
        for resource in &view.resources {
            let subject = self.subject_iri(resource.resource_id);
            graph.insert(
                subject.clone(),
                vocab::RDF_TYPE,
                vocab::skos(resource.kind.skos_class()),
            );

            for triple in extract_all(resource.kind, &resource.tiles) {
                let object: Term = match &triple.object {
                    TripleObject::Resource(id) => self.subject_iri(*id).into(),
                    TripleObject::Literal(value) => self
                        .literal(value, triple.object_language.as_deref())?
                        .into(),
                };
                match (triple.predicate.as_str(), object) {
                    ("hasTopConcept", Term::NamedNode(scheme)) => {
                        graph.insert(scheme, vocab::skos("hasTopConcept"), subject.clone());
                    }
                    (predicate, object) => {
                        graph.insert(subject.clone(), predicate_iri(predicate), object);
                    }
                }
            }
        }
        Ok(graph)
    }

    /// Serialize `view` as RDF/XML in `format`.
    pub fn write(&self, view: &ExportView, format: &str) -> Result<String> {
        check_format(format)?;
        write_rdfxml(&self.to_graph(view)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportResource;
    use crate::mapper::{map_relationship, map_value, Relationship};
    use crate::models::{ResourceKind, SourceValue};
    use oxrdf::Triple;

    fn view() -> (ExportView, Uuid, Uuid) {
        let languages = LanguageLookup::with_defaults();
        let scheme = Uuid::from_u128(1);
        let concept = Uuid::from_u128(2);
        let label = map_value(
            &SourceValue::new("prefLabel", "Wood").with_language("de"),
            ResourceKind::Concept,
            &languages,
        )
        .unwrap();
        let view = ExportView {
            scheme_id: scheme,
            resources: vec![
                ExportResource::new(scheme, ResourceKind::Scheme, vec![]),
                ExportResource::new(
                    concept,
                    ResourceKind::Concept,
                    vec![
                        label,
                        map_relationship(Relationship::TopConceptOf, scheme),
                        map_relationship(Relationship::PartOfScheme, scheme),
                    ],
                ),
            ],
        };
        (view, scheme, concept)
    }

    #[test]
    fn test_has_top_concept_is_inverted() {
        let languages = LanguageLookup::with_defaults();
        let writer = SkosWriter::new("http://ex.org/", &languages);
        let (view, scheme, concept) = view();
        let g = writer.to_graph(&view).unwrap();
        assert!(g.contains(&Triple::new(
            writer.subject_iri(scheme),
            vocab::skos("hasTopConcept"),
            writer.subject_iri(concept)
        )));
        assert!(g.contains(&Triple::new(
            writer.subject_iri(concept),
            vocab::skos("inScheme"),
            writer.subject_iri(scheme)
        )));
    }

    #[test]
    fn test_language_name_becomes_code() {
        let languages = LanguageLookup::with_defaults();
        let writer = SkosWriter::new("http://ex.org/", &languages);
        let (view, _, concept) = view();
        let g = writer.to_graph(&view).unwrap();
        assert!(g.contains(&Triple::new(
            writer.subject_iri(concept),
            vocab::skos("prefLabel"),
            Literal::new_language_tagged_literal("Wood", "de").unwrap()
        )));
    }

    #[test]
    fn test_unsupported_format() {
        let languages = LanguageLookup::with_defaults();
        let writer = SkosWriter::new("http://ex.org/", &languages);
        let (view, _, _) = view();
        assert!(matches!(
            writer.write(&view, "turtle"),
            Err(Error::UnsupportedFormat(f)) if f == "turtle"
        ));
        let xml = writer.write(&view, "pretty-xml").unwrap();
        assert!(xml.contains(&format!("rdf:about=\"{}\"", writer.subject_iri(Uuid::from_u128(1)).as_str())));
    }
}

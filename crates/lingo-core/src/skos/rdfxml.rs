//! RDF/XML parsing and serialization through `rio_xml`.
//!
//! `xml:base`, `rdf:ID`, typed literals and literal whitespace follow the
//! RDF/XML grammar. Written documents group each subject's triples into one
//! `rdf:Description`.

use oxrdf::vocab::xsd;
use oxrdf::{BlankNode, Literal, NamedNode, Subject, Term, Triple};
use rio_api::formatter::TriplesFormatter;
use rio_api::model as rio;
use rio_api::parser::TriplesParser;
use rio_xml::{RdfXmlError, RdfXmlFormatter, RdfXmlParser};

use super::graph::RdfGraph;
use crate::error::{Error, Result};

/// Parse an RDF/XML document into a graph.
pub fn parse_rdfxml(input: &str) -> Result<RdfGraph> {
    let mut graph = RdfGraph::new();
    let mut parser = RdfXmlParser::new(input.as_bytes(), None);
    parser.parse_all(&mut |t| -> std::result::Result<(), RdfXmlError> {
        if let Some(triple) = from_rio(t) {
            graph.insert_triple(triple);
        }
        Ok(())
    })?;
    Ok(graph)
}

/// RDF-star triples have no RDF/XML syntax and are skipped.
fn from_rio(t: rio::Triple<'_>) -> Option<Triple> {
    let subject: Subject = match t.subject {
        rio::Subject::NamedNode(n) => NamedNode::new_unchecked(n.iri).into(),
        rio::Subject::BlankNode(b) => BlankNode::new_unchecked(b.id).into(),
        _ => return None,
    };
    let object: Term = match t.object {
        rio::Term::NamedNode(n) => NamedNode::new_unchecked(n.iri).into(),
        rio::Term::BlankNode(b) => BlankNode::new_unchecked(b.id).into(),
        rio::Term::Literal(rio::Literal::Simple { value }) => {
            Literal::new_simple_literal(value).into()
        }
        rio::Term::Literal(rio::Literal::LanguageTaggedString { value, language }) => {
            Literal::new_language_tagged_literal_unchecked(value, language).into()
        }
        rio::Term::Literal(rio::Literal::Typed { value, datatype }) => {
            Literal::new_typed_literal(value, NamedNode::new_unchecked(datatype.iri)).into()
        }
        _ => return None,
    };
    Some(Triple::new(
        subject,
        NamedNode::new_unchecked(t.predicate.iri),
        object,
    ))
}

fn to_rio(t: &Triple) -> rio::Triple<'_> {
    let subject = match &t.subject {
        Subject::NamedNode(n) => rio::Subject::NamedNode(rio::NamedNode { iri: n.as_str() }),
        Subject::BlankNode(b) => rio::Subject::BlankNode(rio::BlankNode { id: b.as_str() }),
    };
    let object = match &t.object {
        Term::NamedNode(n) => rio::Term::NamedNode(rio::NamedNode { iri: n.as_str() }),
        Term::BlankNode(b) => rio::Term::BlankNode(rio::BlankNode { id: b.as_str() }),
        Term::Literal(l) => rio::Term::Literal(match l.language() {
            Some(language) => rio::Literal::LanguageTaggedString {
                value: l.value(),
                language,
            },
            None if l.datatype() == xsd::STRING => rio::Literal::Simple { value: l.value() },
            None => rio::Literal::Typed {
                value: l.value(),
                datatype: rio::NamedNode {
                    iri: l.datatype().as_str(),
                },
            },
        }),
    };
    rio::Triple {
        subject,
        predicate: rio::NamedNode {
            iri: t.predicate.as_str(),
        },
        object,
    }
}

fn write_err(e: impl std::fmt::Display) -> Error {
    Error::Rdf(format!("Write error: {e}"))
}

/// Serialize a graph as indented RDF/XML, subjects in first-seen order.
pub fn write_rdfxml(graph: &RdfGraph) -> Result<String> {
    let mut formatter = RdfXmlFormatter::with_indentation(Vec::new(), 2).map_err(write_err)?;
    for subject in graph.subjects() {
        for triple in graph.triples_for(subject) {
            formatter.format(&to_rio(triple)).map_err(write_err)?;
        }
    }
    let mut output = formatter.finish().map_err(write_err)?;
    output.push(b'\n');
    String::from_utf8(output).map_err(|e| Error::Rdf(format!("Invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skos::vocab;

    const DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:skos="http://www.w3.org/2004/02/skos/core#"
         xmlns:dcterms="http://purl.org/dc/terms/"
         xml:lang="en">
  <skos:ConceptScheme rdf:about="http://example.org/scheme">
    <dcterms:title>Materials</dcterms:title>
    <skos:hasTopConcept rdf:resource="http://example.org/c/1"/>
  </skos:ConceptScheme>
  <rdf:Description rdf:about="http://example.org/c/1">
    <rdf:type rdf:resource="http://www.w3.org/2004/02/skos/core#Concept"/>
    <skos:prefLabel xml:lang="de">Holz</skos:prefLabel>
    <skos:prefLabel>Wood &amp; timber</skos:prefLabel>
    <skos:narrower>
      <skos:Concept rdf:about="http://example.org/c/2" skos:notation="W2"/>
    </skos:narrower>
  </rdf:Description>
</rdf:RDF>"#;

    fn node(iri: &str) -> NamedNode {
        NamedNode::new_unchecked(iri)
    }

    fn subject(iri: &str) -> Subject {
        node(iri).into()
    }

    fn tagged(value: &str, lang: &str) -> Term {
        Literal::new_language_tagged_literal(value, lang).unwrap().into()
    }

    #[test]
    fn test_parse_typed_nodes_and_languages() {
        let g = parse_rdfxml(DOC).unwrap();
        assert_eq!(
            g.subjects_of_type(&vocab::skos("ConceptScheme")),
            vec![&subject("http://example.org/scheme")]
        );
        assert_eq!(
            g.subjects_of_type(&vocab::skos("Concept")),
            vec![&subject("http://example.org/c/1"), &subject("http://example.org/c/2")]
        );
        let c1 = subject("http://example.org/c/1");
        let labels: Vec<_> = g.objects(&c1, &vocab::skos("prefLabel")).cloned().collect();
        assert!(labels.contains(&tagged("Holz", "de")));
        assert!(labels.contains(&tagged("Wood & timber", "en")));
        assert!(g.contains(&Triple::new(
            c1,
            vocab::skos("narrower"),
            node("http://example.org/c/2")
        )));
        assert!(g.contains(&Triple::new(
            subject("http://example.org/c/2"),
            vocab::skos("notation"),
            tagged("W2", "en")
        )));
    }

    #[test]
    fn test_xml_base_resolves_relative_iris() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                              xmlns:skos="http://www.w3.org/2004/02/skos/core#"
                              xml:base="http://ex.org/">
          <skos:Concept rdf:about="c0"/>
          <skos:Concept rdf:about="http://ex.org/c1">
            <skos:broader rdf:resource="c0"/>
          </skos:Concept>
          <skos:Concept rdf:ID="c2"/>
        </rdf:RDF>"#;
        let g = parse_rdfxml(doc).unwrap();
        assert_eq!(
            g.subjects_of_type(&vocab::skos("Concept")),
            vec![
                &subject("http://ex.org/c0"),
                &subject("http://ex.org/c1"),
                &subject("http://ex.org/#c2"),
            ]
        );
        assert!(g.contains(&Triple::new(
            subject("http://ex.org/c1"),
            vocab::skos("broader"),
            node("http://ex.org/c0")
        )));
    }

    #[test]
    fn test_typed_literal_keeps_datatype_not_language() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                              xmlns:dcterms="http://purl.org/dc/terms/"
                              xml:lang="en">
          <rdf:Description rdf:about="http://ex.org/c">
            <dcterms:identifier rdf:datatype="http://www.w3.org/2001/XMLSchema#string">1</dcterms:identifier>
            <dcterms:extent rdf:datatype="http://www.w3.org/2001/XMLSchema#integer">42</dcterms:extent>
          </rdf:Description>
        </rdf:RDF>"#;
        let g = parse_rdfxml(doc).unwrap();
        let c = subject("http://ex.org/c");
        let identifier_p = vocab::dcterms("identifier");
        let identifier: Vec<_> = g.objects(&c, &identifier_p).collect();
        assert_eq!(identifier, vec![&Term::from(Literal::new_simple_literal("1"))]);
        let extent_p = vocab::dcterms("extent");
        let extent: Vec<_> = g.objects(&c, &extent_p).collect();
        assert_eq!(
            extent,
            vec![&Term::from(Literal::new_typed_literal("42", xsd::INTEGER))]
        );
    }

    #[test]
    fn test_literal_whitespace_is_kept() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                              xmlns:skos="http://www.w3.org/2004/02/skos/core#">
          <rdf:Description rdf:about="http://ex.org/c">
            <skos:scopeNote>  first line
  second line </skos:scopeNote>
          </rdf:Description>
        </rdf:RDF>"#;
        let g = parse_rdfxml(doc).unwrap();
        let c = subject("http://ex.org/c");
        let scope_note = vocab::skos("scopeNote");
        let notes: Vec<_> = g.objects(&c, &scope_note).collect();
        assert_eq!(
            notes,
            vec![&Term::from(Literal::new_simple_literal(
                "  first line\n  second line "
            ))]
        );
    }

    #[test]
    fn test_parse_type_resource_creates_blank_node() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                              xmlns:ex="http://example.org/">
          <rdf:Description rdf:about="http://example.org/a">
            <ex:meta rdf:parseType="Resource"><ex:note>n</ex:note></ex:meta>
          </rdf:Description>
        </rdf:RDF>"#;
        let g = parse_rdfxml(doc).unwrap();
        let meta = node("http://example.org/meta");
        let blank = match g.objects(&subject("http://example.org/a"), &meta).next() {
            Some(Term::BlankNode(b)) => Subject::from(b.clone()),
            other => panic!("expected a blank node, got {:?}", other),
        };
        assert_eq!(g.objects(&blank, &node("http://example.org/note")).count(), 1);
    }

    #[test]
    fn test_undeclared_prefix_is_error() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
          <foo:Thing rdf:about="http://ex.org/x"/></rdf:RDF>"#;
        assert!(matches!(parse_rdfxml(doc), Err(Error::Rdf(_))));
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(parse_rdfxml("<rdf:RDF").is_err());
    }

    #[test]
    fn test_write_then_parse_preserves_triples() {
        let g = parse_rdfxml(DOC).unwrap();
        let xml = write_rdfxml(&g).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("rdf:about=\"http://example.org/c/1\""));
        assert!(xml.contains("xml:lang=\"de\""));
        let reparsed = parse_rdfxml(&xml).unwrap();
        assert_eq!(reparsed.len(), g.len());
        for t in g.iter() {
            assert!(reparsed.contains(t));
        }
    }

    #[test]
    fn test_write_unprefixable_type_and_typed_literal() {
        let mut g = RdfGraph::new();
        let s = subject("urn:x-lingo:thing");
        g.insert(s.clone(), vocab::RDF_TYPE, node("urn:x-lingo:Kind"));
        g.insert(
            s.clone(),
            vocab::dcterms("extent"),
            Literal::new_typed_literal("42", xsd::INTEGER),
        );
        g.insert(s, vocab::skos("note"), BlankNode::new_unchecked("n1"));
        let reparsed = parse_rdfxml(&write_rdfxml(&g).unwrap()).unwrap();
        assert_eq!(reparsed.len(), 3);
        assert!(reparsed.contains(&Triple::new(
            subject("urn:x-lingo:thing"),
            vocab::RDF_TYPE,
            node("urn:x-lingo:Kind")
        )));
        assert!(reparsed.contains(&Triple::new(
            subject("urn:x-lingo:thing"),
            vocab::dcterms("extent"),
            Literal::new_typed_literal("42", xsd::INTEGER)
        )));
    }
}

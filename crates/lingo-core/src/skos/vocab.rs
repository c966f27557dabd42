//! Namespaces and predicate names used when reading and writing SKOS.

use oxrdf::NamedNode;

pub const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";
pub const DCTERMS: &str = "http://purl.org/dc/terms/";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";

pub use oxrdf::vocab::rdf::TYPE as RDF_TYPE;

/// SKOS mapping relations (plus `owl:inverseOf`) that import as statements.
pub const MATCH_PREDICATES: &[&str] = &[
    "broadMatch",
    "closeMatch",
    "exactMatch",
    "narrowMatch",
    "relatedMatch",
    "mappingRelation",
    "inverseOf",
];

pub fn skos(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{}{}", SKOS, local))
}

pub fn dcterms(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{}{}", DCTERMS, local))
}

/// Split an IRI into namespace and local name at the last `#` or `/`.
pub fn split_iri(iri: &str) -> (&str, &str) {
    match iri.rfind(['#', '/']) {
        Some(pos) => (&iri[..=pos], &iri[pos + 1..]),
        None => ("", iri),
    }
}

/// Local name if `iri` lives in one of the namespaces labels and notes are
/// read from.
pub fn value_predicate(iri: &str) -> Option<&str> {
    let (ns, local) = split_iri(iri);
    (ns == SKOS || ns == DCTERMS).then_some(local)
}

/// Local name if `iri` is one of the matching relations.
pub fn match_predicate(iri: &str) -> Option<&str> {
    let (ns, local) = split_iri(iri);
    ((ns == SKOS || ns == OWL) && MATCH_PREDICATES.contains(&local)).then_some(local)
}

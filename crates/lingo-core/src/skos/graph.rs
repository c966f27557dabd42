//! In-memory RDF graph over `oxrdf` terms.

use std::collections::HashSet;

use oxrdf::{NamedNode, NamedNodeRef, Subject, Term, Triple};

use super::vocab;

/// Ordered set of triples. Insertion order is kept so written documents are
/// stable; duplicates are ignored.
#[derive(Debug, Clone, Default)]
pub struct RdfGraph {
    triples: Vec<Triple>,
    index: HashSet<Triple>,
}

impl RdfGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triple; returns false if it was already present.
    pub fn insert(
        &mut self,
        subject: impl Into<Subject>,
        predicate: impl Into<NamedNode>,
        object: impl Into<Term>,
    ) -> bool {
        self.insert_triple(Triple::new(subject, predicate, object))
    }

    pub fn insert_triple(&mut self, triple: Triple) -> bool {
        if self.index.contains(&triple) {
            return false;
        }
        self.index.insert(triple.clone());
        self.triples.push(triple);
        true
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.index.contains(triple)
    }

    /// Subjects in first-seen order.
    pub fn subjects(&self) -> Vec<&Subject> {
        let mut seen = HashSet::new();
        self.triples
            .iter()
            .map(|t| &t.subject)
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// Subjects typed with `class`, in first-seen order.
    pub fn subjects_of_type(&self, class: &NamedNode) -> Vec<&Subject> {
        let mut seen = HashSet::new();
        self.triples
            .iter()
            .filter(|t| t.predicate == vocab::RDF_TYPE)
            .filter(|t| matches!(&t.object, Term::NamedNode(n) if n == class))
            .map(|t| &t.subject)
            .filter(|s| seen.insert(*s))
            .collect()
    }

    pub fn objects<'a>(
        &'a self,
        subject: &'a Subject,
        predicate: impl Into<NamedNodeRef<'a>>,
    ) -> impl Iterator<Item = &'a Term> + 'a {
        let predicate = predicate.into();
        self.triples
            .iter()
            .filter(move |t| t.subject == *subject && t.predicate == predicate)
            .map(|t| &t.object)
    }

    /// Every triple of a subject, in insertion order.
    pub fn triples_for<'a>(&'a self, subject: &'a Subject) -> impl Iterator<Item = &'a Triple> + 'a {
        self.triples.iter().filter(move |t| t.subject == *subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::Literal;

    fn node(iri: &str) -> NamedNode {
        NamedNode::new_unchecked(iri)
    }

    #[test]
    fn test_insert_dedupes() {
        let mut g = RdfGraph::new();
        assert!(g.insert(node("http://x/a"), vocab::RDF_TYPE, vocab::skos("Concept")));
        assert!(!g.insert(node("http://x/a"), vocab::RDF_TYPE, vocab::skos("Concept")));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_subjects_of_type_in_order() {
        let mut g = RdfGraph::new();
        g.insert(node("http://x/b"), vocab::RDF_TYPE, vocab::skos("Concept"));
        g.insert(node("http://x/s"), vocab::RDF_TYPE, vocab::skos("ConceptScheme"));
        g.insert(node("http://x/a"), vocab::RDF_TYPE, vocab::skos("Concept"));
        let concepts: Vec<String> = g
            .subjects_of_type(&vocab::skos("Concept"))
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(concepts, vec!["<http://x/b>", "<http://x/a>"]);
        assert_eq!(g.subjects().len(), 3);
    }

    #[test]
    fn test_objects_lookup() {
        let mut g = RdfGraph::new();
        let subject = Subject::from(node("http://x/a"));
        let label = vocab::skos("prefLabel");
        let en = Literal::new_language_tagged_literal("A", "en").unwrap();
        let de = Literal::new_language_tagged_literal("Ah", "de").unwrap();
        g.insert(subject.clone(), label.clone(), en.clone());
        g.insert(subject.clone(), label.clone(), de);
        assert_eq!(g.objects(&subject, &label).count(), 2);
        assert!(g.contains(&Triple::new(subject.clone(), label, en)));
        assert_eq!(g.triples_for(&subject).count(), 2);
    }
}

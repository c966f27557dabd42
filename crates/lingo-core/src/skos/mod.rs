//! SKOS in RDF/XML: parsing, in-memory graph, reading into resources and
//! writing export views.

pub mod graph;
pub mod rdfxml;
pub mod reader;
pub mod vocab;
pub mod writer;

pub use graph::RdfGraph;
pub use oxrdf::{Literal, NamedNode, Subject, Term, Triple};
pub use rdfxml::{parse_rdfxml, write_rdfxml};
pub use reader::{SkosImport, SkosReader};
pub use writer::{check_format, SkosWriter, SUPPORTED_FORMATS};

//! # lingo-core
//!
//! Core types, mapping tables, and pure migration stages for the lingo
//! thesaurus engine.
//!
//! Everything in this crate is synchronous and storage-agnostic: hierarchy
//! extraction, value/relationship mapping, staging validation, triple
//! extraction, SKOS RDF/XML reading and writing, lifecycle planning and
//! fuzzy search. `lingo-db` wires these stages to PostgreSQL.

pub mod config;
pub mod datatypes;
pub mod defaults;
pub mod error;
pub mod export;
pub mod graph_model;
pub mod hierarchy;
pub mod legacy;
pub mod lifecycle;
pub mod logging;
pub mod lookups;
pub mod mapper;
pub mod models;
pub mod search;
pub mod skos;
pub mod staging;
pub mod traits;
pub mod trees;
pub mod triples;

// Re-export commonly used types at crate root
pub use config::LingoConfig;
pub use datatypes::{Datatype, DatatypeRegistry};
pub use error::{Error, Result};
pub use export::{hierarchy_edges, ExportResource, ExportView};
pub use graph_model::{Cardinality, GraphModel, NodeDef, NodegroupDef};
pub use hierarchy::{Hierarchy, HierarchyEdge, HierarchyEntry, HierarchyExtractor};
pub use legacy::{LegacyConcept, LegacyMigration, LegacyPlan};
pub use lifecycle::{
    plan_identifier_assignments, plan_uri_updates, render_scheme_uri, render_uri,
    ConceptUriState, IdentifierAssignment, LifecycleTransition, UriAction,
};
pub use lookups::{ControlledLists, LanguageLookup, ListItem, MigrationContext};
pub use mapper::{map_relationship, map_value, Relationship};
pub use models::*;
pub use search::{fuzzy_search, LabelRecord, OrderMode, Page, SearchHit};
pub use staging::{StagingBatch, StagingEngine};
pub use traits::*;
pub use trees::{build_concept_trees, ConceptTreeNode, SchemeTree};
pub use triples::{extract_all, extract_triples, ExtractedTriple, TripleObject};

//! Error types for lingo.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using lingo's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lingo operations.
///
/// Per-field validation failures are *not* errors: they are recorded as
/// [`crate::LoadError`] rows and the load continues. Everything in this enum
/// aborts the operation that raised it.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A concept was reached from more than one scheme root.
    #[error(
        "Concepts may only participate in one scheme: concept {concept} belongs to \
         scheme {existing}, cannot also belong to scheme {current}"
    )]
    SchemeConflict {
        concept: Uuid,
        existing: Uuid,
        current: Uuid,
    },

    /// The concept hierarchy contains a cycle (or exceeds the depth guard).
    #[error("Hierarchy cycle detected at concept {concept} (path: {path})")]
    HierarchyCycle { concept: Uuid, path: String },

    /// Requested export format is not supported.
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// RDF parsing or serialization failed
    #[error("RDF error: {0}")]
    Rdf(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rio_xml::RdfXmlError> for Error {
    fn from(e: rio_xml::RdfXmlError) -> Self {
        Error::Rdf(e.to_string())
    }
}
